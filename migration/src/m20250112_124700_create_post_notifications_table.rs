use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PostNotifications::Table)
                    .if_not_exists()
                    .col(big_integer(PostNotifications::PostId).primary_key())
                    .col(string(PostNotifications::PostType))
                    .col(string(PostNotifications::Status))
                    .col(text(PostNotifications::Title))
                    .col(text(PostNotifications::Content))
                    .col(boolean(PostNotifications::SendNotification).default(false))
                    .col(timestamp_with_time_zone_null(
                        PostNotifications::ScheduledAt,
                    ))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostNotifications::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PostNotifications {
    Table,
    PostId,
    PostType,
    Status,
    Title,
    Content,
    SendNotification,
    ScheduledAt,
}
