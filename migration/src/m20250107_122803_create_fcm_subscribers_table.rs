use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FcmSubscribers::Table)
                    .if_not_exists()
                    .col(pk_auto(FcmSubscribers::Id))
                    .col(string(FcmSubscribers::Token))
                    .col(string_len_null(FcmSubscribers::DeviceType, 50))
                    .col(string_uniq(FcmSubscribers::DeviceUuid))
                    .col(string_null(FcmSubscribers::DeviceName))
                    .col(string_null(FcmSubscribers::Topic))
                    // Raw JSON text, kept as text so it can be searched with LIKE
                    .col(text_null(FcmSubscribers::OtherData))
                    .col(boolean(FcmSubscribers::Subscribed).default(true))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FcmSubscribers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FcmSubscribers {
    Table,
    Id,
    Token,
    DeviceType,
    DeviceUuid,
    DeviceName,
    Topic,
    OtherData,
    Subscribed,
}
