pub mod activate;
pub mod deactivate;
pub mod delete;
pub mod install_from_repo;
pub mod locate;
