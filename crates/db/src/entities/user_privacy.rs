//! User privacy settings entity.
//!
//! A missing row means the user has never changed the defaults (public
//! account, messages from everyone).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Who may start or continue a direct conversation with the user.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum AllowMessagesFrom {
    #[default]
    #[sea_orm(string_value = "everyone")]
    Everyone,
    #[sea_orm(string_value = "following")]
    Following,
    #[sea_orm(string_value = "none")]
    #[serde(rename = "none")]
    Nobody,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_privacy")]
pub struct Model {
    /// Same as user.id (1:1 relationship)
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    /// Posts are visible to followers only
    #[sea_orm(default_value = false)]
    pub is_private: bool,

    pub allow_messages_from: AllowMessagesFrom,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
