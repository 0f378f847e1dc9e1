use std::str::FromStr;

use sea_orm::ActiveValue::{NotSet, Set};
use tracing::warn;

use crate::storage::models::{ArchivedLink, LinkFields, Role, ShortenedLink, User};
use migration::entities::{deleted_shortened_link, shortened_link, user};

/// 将 Sea-ORM Model 转换为 ShortenedLink
pub fn model_to_link(model: shortened_link::Model) -> ShortenedLink {
    ShortenedLink {
        id: model.id,
        fields: LinkFields {
            original_link: model.original_link,
            shortened_link: model.shortened_link,
            created_at: model.created_at,
            updated_at: model.updated_at,
            remove_at: model.remove_at,
            is_active: model.is_active,
            user_id: model.user_id,
        },
    }
}

/// 新建链接的 ActiveModel（id 由数据库分配）
pub fn fields_to_link_active_model(fields: &LinkFields) -> shortened_link::ActiveModel {
    shortened_link::ActiveModel {
        id: NotSet,
        original_link: Set(fields.original_link.clone()),
        shortened_link: Set(fields.shortened_link.clone()),
        created_at: Set(fields.created_at),
        updated_at: Set(fields.updated_at),
        remove_at: Set(fields.remove_at),
        is_active: Set(fields.is_active),
        user_id: Set(fields.user_id),
    }
}

/// 更新已有链接的 ActiveModel（created_at 与 user_id 不可修改）
pub fn link_to_update_active_model(link: &ShortenedLink) -> shortened_link::ActiveModel {
    shortened_link::ActiveModel {
        id: Set(link.id),
        original_link: Set(link.fields.original_link.clone()),
        shortened_link: Set(link.fields.shortened_link.clone()),
        created_at: NotSet,
        updated_at: Set(link.fields.updated_at),
        remove_at: Set(link.fields.remove_at),
        is_active: Set(link.fields.is_active),
        user_id: NotSet,
    }
}

pub fn model_to_archived(model: deleted_shortened_link::Model) -> ArchivedLink {
    ArchivedLink {
        id: model.id,
        fields: LinkFields {
            original_link: model.original_link,
            shortened_link: model.shortened_link,
            created_at: model.created_at,
            updated_at: model.updated_at,
            remove_at: model.remove_at,
            is_active: model.is_active,
            user_id: model.user_id,
        },
        removed_at: model.removed_at,
    }
}

pub fn fields_to_archived_active_model(
    fields: &LinkFields,
    removed_at: chrono::DateTime<chrono::Utc>,
) -> deleted_shortened_link::ActiveModel {
    deleted_shortened_link::ActiveModel {
        id: NotSet,
        original_link: Set(fields.original_link.clone()),
        shortened_link: Set(fields.shortened_link.clone()),
        created_at: Set(fields.created_at),
        updated_at: Set(fields.updated_at),
        remove_at: Set(fields.remove_at),
        is_active: Set(fields.is_active),
        user_id: Set(fields.user_id),
        removed_at: Set(removed_at),
    }
}

pub fn model_to_user(model: user::Model) -> User {
    let role = Role::from_str(&model.role).unwrap_or_else(|_| {
        warn!(
            "Unknown role '{}' for user {}, treating as regular user",
            model.role, model.id
        );
        Role::User
    });

    User {
        id: model.id,
        username: model.username,
        role,
        is_superuser: model.is_superuser,
        max_num_links: model.max_num_links.max(0) as u32,
        max_num_links_temporary: model.max_num_links_temporary.max(0) as u32,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

pub fn user_to_active_model(user: &User, is_new: bool) -> user::ActiveModel {
    user::ActiveModel {
        id: if is_new { NotSet } else { Set(user.id) },
        username: Set(user.username.clone()),
        role: Set(user.role.as_ref().to_string()),
        is_superuser: Set(user.is_superuser),
        max_num_links: Set(user.max_num_links.min(i32::MAX as u32) as i32),
        max_num_links_temporary: Set(user.max_num_links_temporary.min(i32::MAX as u32) as i32),
        created_at: if is_new { Set(user.created_at) } else { NotSet },
        updated_at: Set(user.updated_at),
    }
}
