/// The name of the cookie that may contain the JWT access token
pub static ACCESS_TOKEN_COOKIE: &str = "docvault-access-token";
