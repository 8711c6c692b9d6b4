pub mod config;
pub mod error;
pub mod policy;
pub mod response;
pub mod routes;
pub mod state;
pub mod vigencia;

pub mod crypto {
    pub mod password;
    pub mod token;
}

pub mod models {
    pub mod coordinates;
    pub mod session;
    pub mod site;
    pub mod user;
}

pub mod repositories {
    pub mod nocodb;
    pub mod site;
    pub mod user;
}

pub mod services {
    pub mod auth;
    pub mod images;
    pub mod sites;
}

pub mod handlers {
    pub mod auth;
    pub mod images;
    pub mod sites;
    pub mod users;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod rate_limit;
}

pub mod validation {
    pub mod auth;
    pub mod site;
}
