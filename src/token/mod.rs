pub mod generator;

pub use generator::{
    effective_max_size, generate_token, validate_token_size, RandomTokenGenerator, TokenGenerator,
    TokenSize, DEFAULT_DASH_SPLIT_EACH, TOKEN_MAX_SIZE, TOKEN_MIN_SIZE,
};
