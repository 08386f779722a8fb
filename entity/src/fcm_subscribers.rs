use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "fcm_subscribers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub token: String,
    pub device_type: Option<String>,
    #[sea_orm(unique)]
    pub device_uuid: String,
    pub device_name: Option<String>,
    pub topic: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub other_data: Option<String>,
    pub subscribed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
