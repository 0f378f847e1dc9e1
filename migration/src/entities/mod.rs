pub mod deleted_shortened_link;
pub mod shortened_link;
pub mod user;

pub use deleted_shortened_link::Entity as DeletedShortenedLinkEntity;
pub use shortened_link::Entity as ShortenedLinkEntity;
pub use user::Entity as UserEntity;
