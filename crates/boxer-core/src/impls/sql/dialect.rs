//! Dialect - ドライバごとの SQL の差分
//!
//! | | MySQL | PostgreSQL | SQLite |
//! |---|---|---|---|
//! | プレースホルダ | `?` | `$n` | `?` |
//! | read committed | 接続時に session へ設定 | トランザクション先頭で設定 | なし（DB ロック） |
//! | 行ロック | `FOR UPDATE` | `FOR UPDATE` | 開始直後に書き込みロックを取る |
//! | 取得列 | `CAST(.. AS CHAR / SIGNED)` | `::text` / `::int8` | そのまま |
//!
//! Any ドライバは TINYINT や JSON / JSONB、CHAR(n)、enum をデコードできないので、
//! claim の SELECT で列を文字列と 64bit 整数に揃えて返す。

use crate::domain::{AdmissionError, TableName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn from_driver(driver: &str) -> Result<Self, AdmissionError> {
        match driver.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgresql" | "pgx" | "pq" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            _ => Err(AdmissionError::UnsupportedDriver(driver.to_string())),
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// DSN を sqlx の接続 URL にする
    ///
    /// スキーム付きならそのまま。MySQL の `user:pw@tcp(host:port)/db` 形式は
    /// `mysql://user:pw@host:port/db` に書き換える。それ以外はスキームを前置する。
    pub fn connection_url(&self, dsn: &str) -> String {
        let dsn = dsn.trim();
        if dsn.contains("://") || (*self == Dialect::Sqlite && dsn.starts_with("sqlite:")) {
            return dsn.to_string();
        }
        match self {
            Dialect::MySql => mysql_url(dsn),
            _ => format!("{}://{dsn}", self.scheme()),
        }
    }

    /// n 番目（1 始まり）のバインド位置
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            _ => "?".to_string(),
        }
    }

    /// 新しい接続ごとに流す文
    pub fn session_setup(&self) -> Option<&'static str> {
        match self {
            Dialect::MySql => Some("SET SESSION TRANSACTION ISOLATION LEVEL READ COMMITTED"),
            _ => None,
        }
    }

    /// トランザクションの最初に流す文
    ///
    /// SQLite は `FOR UPDATE` が無いので、何も更新しない UPDATE で
    /// 開始時点に書き込みロックを取る（`BEGIN IMMEDIATE` 相当）。
    /// 後続の claim は busy_timeout の間ここで待たされる。
    pub fn transaction_setup(&self, table: &TableName) -> Option<String> {
        match self {
            Dialect::Postgres => {
                Some("SET TRANSACTION ISOLATION LEVEL READ COMMITTED".to_string())
            }
            Dialect::Sqlite => Some(format!("UPDATE {table} SET status = status WHERE 1 = 0")),
            Dialect::MySql => None,
        }
    }

    pub fn lock_clause(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "",
            _ => " FOR UPDATE",
        }
    }

    pub fn probe_sql(&self, table: &TableName) -> String {
        format!("SELECT 1 FROM {table} LIMIT 1")
    }

    /// claim で読む列（型を Any ドライバが扱えるものに揃える）
    pub fn claim_columns(&self) -> &'static str {
        match self {
            Dialect::MySql => {
                "CAST(id AS SIGNED) AS id, CAST(body AS CHAR) AS body, \
                 CAST(meta AS CHAR) AS meta, CAST(status AS CHAR) AS status, \
                 CAST(attempt_count AS SIGNED) AS attempt_count"
            }
            Dialect::Postgres => {
                "id::int8 AS id, body::text AS body, meta::text AS meta, \
                 status::text AS status, attempt_count::int8 AS attempt_count"
            }
            Dialect::Sqlite => "id, body, meta, status, attempt_count",
        }
    }

    pub fn select_pending_sql(&self, table: &TableName) -> String {
        format!(
            "SELECT {} FROM {table} WHERE status = 'new' ORDER BY id LIMIT {}{}",
            self.claim_columns(),
            self.placeholder(1),
            self.lock_clause()
        )
    }

    pub fn transition_sql(&self, table: &TableName) -> String {
        format!(
            "UPDATE {table} SET status = {}, attempt_count = attempt_count + 1 WHERE id = {}",
            self.placeholder(1),
            self.placeholder(2)
        )
    }
}

fn mysql_url(dsn: &str) -> String {
    let (userinfo, address) = match dsn.rsplit_once('@') {
        Some((user, rest)) => (Some(user), rest),
        None => (None, dsn),
    };
    let (host, path) = if let Some(inner) = address.strip_prefix("tcp(") {
        match inner.split_once(')') {
            Some(parts) => parts,
            None => return format!("mysql://{dsn}"),
        }
    } else if address.starts_with('/') {
        ("localhost", address)
    } else {
        return format!("mysql://{dsn}");
    };
    match userinfo {
        Some(userinfo) => format!("mysql://{}@{host}{path}", encode_userinfo(userinfo)),
        None => format!("mysql://{host}{path}"),
    }
}

/// Go DSN の userinfo は生の文字列なので、URL に載せる前にエンコードする
fn encode_userinfo(userinfo: &str) -> String {
    match userinfo.split_once(':') {
        Some((user, password)) => format!(
            "{}:{}",
            urlencoding::encode(user),
            urlencoding::encode(password)
        ),
        None => urlencoding::encode(userinfo).into_owned(),
    }
}
