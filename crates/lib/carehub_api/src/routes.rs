//! Route paths.

pub const POST_LOGIN: &str = "/login";
pub const POST_REGISTER: &str = "/register";
pub const POST_REFRESH_TOKEN: &str = "/refresh-token";
pub const POST_LOGOUT: &str = "/logout";
pub const GET_PROFILE: &str = "/profile";
pub const GET_SESSION: &str = "/session";
pub const POST_FORGOT_PASSWORD: &str = "/forgot-password";
pub const POST_RESET_PASSWORD: &str = "/reset-password";
pub const POST_CHANGE_PASSWORD: &str = "/change-password";
pub const USERS: &str = "/users";
pub const USERS_ID: &str = "/users/{id}";
pub const PATCH_USERS_ID_FACILITY: &str = "/users/{id}/facility";
