//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Display username (case preserved)
    pub username: String,

    /// Lowercase username for case-insensitive lookups (unique)
    #[sea_orm(unique)]
    pub username_lower: String,

    /// Email address, stored lowercase (unique)
    #[sea_orm(unique)]
    pub email: String,

    /// Argon2 password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub bio: Option<String>,

    /// Profile picture URL
    #[sea_orm(nullable)]
    pub profile_picture: Option<String>,

    #[sea_orm(default_value = false)]
    pub email_verified: bool,

    /// Pending one-time password (verification or login)
    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub otp_code: Option<String>,

    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub otp_expires_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::user_privacy::Entity")]
    Privacy,

    #[sea_orm(has_many = "super::post::Entity")]
    Posts,

    #[sea_orm(has_many = "super::story::Entity")]
    Stories,
}

impl Related<super::user_privacy::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Privacy.def()
    }
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Posts.def()
    }
}

impl Related<super::story::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
