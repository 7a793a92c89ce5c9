//! Create story, story view and story reaction tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Story::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Story::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Story::AuthorId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Story::MediaType)
                            .string_len(16)
                            .not_null()
                            .default("image"),
                    )
                    .col(ColumnDef::new(Story::MediaUrl).string_len(1024).not_null())
                    .col(ColumnDef::new(Story::Caption).text())
                    .col(
                        ColumnDef::new(Story::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Story::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_story_author")
                            .from(Story::Table, Story::AuthorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (author_id, expires_at) (for active story listings)
        manager
            .create_index(
                Index::create()
                    .name("idx_story_author_expires_at")
                    .table(Story::Table)
                    .col(Story::AuthorId)
                    .col(Story::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StoryView::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoryView::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StoryView::StoryId).string_len(32).not_null())
                    .col(ColumnDef::new(StoryView::ViewerId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(StoryView::ViewedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_story_view_story")
                            .from(StoryView::Table, StoryView::StoryId)
                            .to(Story::Table, Story::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_story_view_viewer")
                            .from(StoryView::Table, StoryView::ViewerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one view per (story, viewer)
        manager
            .create_index(
                Index::create()
                    .name("idx_story_view_story_viewer")
                    .table(StoryView::Table)
                    .col(StoryView::StoryId)
                    .col(StoryView::ViewerId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StoryReaction::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoryReaction::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StoryReaction::StoryId).string_len(32).not_null())
                    .col(ColumnDef::new(StoryReaction::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(StoryReaction::Emoji).string_len(64).not_null())
                    .col(
                        ColumnDef::new(StoryReaction::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_story_reaction_story")
                            .from(StoryReaction::Table, StoryReaction::StoryId)
                            .to(Story::Table, Story::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_story_reaction_user")
                            .from(StoryReaction::Table, StoryReaction::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one active reaction per (story, user)
        manager
            .create_index(
                Index::create()
                    .name("idx_story_reaction_story_user")
                    .table(StoryReaction::Table)
                    .col(StoryReaction::StoryId)
                    .col(StoryReaction::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StoryReaction::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StoryView::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Story::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Story {
    Table,
    Id,
    AuthorId,
    MediaType,
    MediaUrl,
    Caption,
    CreatedAt,
    ExpiresAt,
}

#[derive(Iden)]
enum StoryView {
    Table,
    Id,
    StoryId,
    ViewerId,
    ViewedAt,
}

#[derive(Iden)]
enum StoryReaction {
    Table,
    Id,
    StoryId,
    UserId,
    Emoji,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
