//! Course platform API: student and teacher accounts, bearer-token
//! authentication, teacher-owned courses and image uploads.

pub mod config;
pub mod db;
pub mod error;
pub mod policy;
pub mod routes;
pub mod state;
pub mod upload;

pub mod crypto {
    pub mod password;
    pub mod token;
}

pub mod models;
pub mod repositories;

pub mod services {
    pub mod auth;
    pub mod courses;
    pub mod entities;
}

pub mod handlers {
    pub mod auth;
    pub mod courses;
    pub mod entities;
    pub mod health;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod course;
    pub mod entity;
}

pub use config::Config;
pub use routes::build_router;
pub use state::AppState;
