//! Conversation entity (direct chat between two users).
//!
//! The participant pair is stored in sorted order so the unique index on
//! `(participant_a, participant_b)` covers the unordered pair.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conversation")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Lexicographically smaller participant id
    pub participant_a: String,

    /// Lexicographically larger participant id
    pub participant_b: String,

    #[sea_orm(nullable)]
    pub last_message_id: Option<String>,

    #[sea_orm(nullable)]
    pub last_message_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether `user_id` takes part in this conversation.
    #[must_use]
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participant_a == user_id || self.participant_b == user_id
    }

    /// The participant that is not `user_id`.
    #[must_use]
    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.participant_a == user_id {
            &self.participant_b
        } else {
            &self.participant_a
        }
    }

    /// Both participants.
    #[must_use]
    pub fn participants(&self) -> [&str; 2] {
        [&self.participant_a, &self.participant_b]
    }
}

/// Order a participant pair the way it is stored.
#[must_use]
pub fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ParticipantA",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    ParticipantA,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ParticipantB",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    ParticipantB,

    #[sea_orm(has_many = "super::message::Entity")]
    Messages,
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
