//! SQL schema definitions as const strings.

/// SQL to create the users table.
pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    about TEXT,
    created_at TEXT NOT NULL
)
"#;

/// SQL to create the categories table. Names are unique per user.
pub const CREATE_CATEGORIES: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(user_id, name)
)
"#;

/// SQL to create the sender assignment table.
///
/// `category_id` is NULL for sentinel outcomes and for assignments whose
/// category was deleted.
pub const CREATE_SENDER_CATEGORIES: &str = r#"
CREATE TABLE IF NOT EXISTS sender_categories (
    sender TEXT NOT NULL,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    category_id TEXT REFERENCES categories(id) ON DELETE SET NULL,
    outcome TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (sender, user_id)
)
"#;

/// SQL to create sender assignment indexes.
pub const CREATE_SENDER_CATEGORY_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_sender_categories_user ON sender_categories(user_id);
CREATE INDEX IF NOT EXISTS idx_sender_categories_category ON sender_categories(category_id)
"#;

/// SQL to create the watermark table.
pub const CREATE_WATERMARKS: &str = r#"
CREATE TABLE IF NOT EXISTS categorization_watermarks (
    user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    oldest TEXT,
    newest TEXT,
    updated_at TEXT NOT NULL
)
"#;

/// Returns all migration statements in order.
pub fn all_migrations() -> Vec<&'static str> {
    vec![
        CREATE_USERS,
        CREATE_CATEGORIES,
        CREATE_SENDER_CATEGORIES,
        CREATE_SENDER_CATEGORY_INDEXES,
        CREATE_WATERMARKS,
    ]
}
