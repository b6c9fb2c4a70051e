use sea_orm::entity::prelude::*;
use serde::Serialize;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "image")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub url: String,
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub path_name: String,
    pub extension: FileExtension,
    pub size: i64,
    pub user_id: i32,
    pub product_id: Option<i32>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

impl Model {
    /// Key of the stored bytes inside the blob store.
    pub fn blob_key(&self) -> String {
        format!("{}.{}", self.path_name, self.extension)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Product,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, DeriveActiveEnum, Serialize)]
#[sea_orm(
    enum_name = "extension_enum",
    db_type = "String(StringLen::N(8))",
    rs_type = "String"
)]
#[serde(rename_all = "lowercase")]
pub enum FileExtension {
    #[sea_orm(string_value = "jpg")]
    Jpg,
    #[sea_orm(string_value = "png")]
    Png,
    #[sea_orm(string_value = "gif")]
    Gif,
}

impl FileExtension {
    /// Maps an upload's content type onto the stored extension.
    pub fn from_content_type(content_type: &str) -> Option<FileExtension> {
        match content_type {
            "image/jpeg" => Some(FileExtension::Jpg),
            "image/png" => Some(FileExtension::Png),
            "image/gif" => Some(FileExtension::Gif),
            _ => None,
        }
    }
}

impl FromStr for FileExtension {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jpg" | "jpeg" => Ok(FileExtension::Jpg),
            "png" => Ok(FileExtension::Png),
            "gif" => Ok(FileExtension::Gif),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            FileExtension::Jpg => "jpg",
            FileExtension::Png => "png",
            FileExtension::Gif => "gif",
        };
        f.write_str(value)
    }
}
