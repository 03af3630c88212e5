pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MAX_COOKING_TIME: i32 = 1440;

pub const MIN_AMOUNT: i32 = 1;
pub const MAX_AMOUNT: i32 = 5000;

pub const MAX_LEN_NAME: usize = 256;
pub const MAX_LEN_USER_FIELD: usize = 150;
pub const MAX_LEN_EMAIL: usize = 254;
pub const MIN_LEN_USERNAME: usize = 5;

/// Usernames may only contain these besides alphanumerics
pub const USERNAME_EXTRA_CHARACTERS: &[char] = &['.', '@', '+', '-', '_'];
pub const FORBIDDEN_USERNAMES: &[&str] = &["me"];

pub const SHORT_LINK_LENGTH: usize = 6;
pub const SHORT_LINK_ATTEMPTS: usize = 10;

pub const SHOPPING_LIST_FILENAME: &str = "shopping_cart_list.txt";

pub const RECIPE_IMAGE_DIR: &str = "recipes";
pub const AVATAR_IMAGE_DIR: &str = "avatars";

/// Request bodies carry base64 images
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;
