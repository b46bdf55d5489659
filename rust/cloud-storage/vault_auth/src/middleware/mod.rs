/// Decodes the bearer token into a [model_vault::UserContext]
pub mod decode_jwt;
/// Role gates that run after [decode_jwt]
pub mod require_role;
