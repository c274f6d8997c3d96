pub mod user_data;

pub use user_data::UserDataEntity;
