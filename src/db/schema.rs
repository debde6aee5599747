//! SQL DDL for the sessions table.

/// Placeholder replaced by the configured table name.
pub const TABLE_PLACEHOLDER: &str = "{table}";

/// MySQL schema with:
/// - `id` CHAR(64) primary key
/// - `data` LONGBLOB opaque session payload
/// - `created`, `modified`, `expires` unsigned Unix seconds
pub const MYSQL_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS `{table}` (
    `id` CHAR(64) NOT NULL,
    `data` LONGBLOB NOT NULL,
    `created` INT(11) UNSIGNED NOT NULL DEFAULT '0',
    `modified` INT(11) UNSIGNED NOT NULL DEFAULT '0',
    `expires` INT(11) UNSIGNED NOT NULL DEFAULT '0',
    PRIMARY KEY (`id`)
) ENGINE=InnoDB
"#;

/// Substitute `table` into a DDL template.
pub fn render_ddl(template: &str, table: &str) -> String {
    template.replace(TABLE_PLACEHOLDER, table)
}

/// Table names are interpolated into SQL, so only `[A-Za-z0-9_]` is accepted.
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
