use std::{fmt::Write, future::Future, sync::LazyLock, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

/// Bytes of entropy behind every generated OAuth state.
pub const STATE_BYTES: usize = 32;

pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DEFAULT_SENSITIVE_FIELDS: &[&str] = &["password", "token", "secret", "key", "api_key"];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

static UNSAFE_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>"']"#).expect("valid sanitize regex"));

/// Generates an anti-forgery state: 32 random bytes, URL-safe base64 without padding.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn generate_api_key(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest. Not a password KDF; kept for fixtures and API keys.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

pub fn verify_password(password: &str, hashed_password: &str) -> bool {
    hash_password(password) == hashed_password
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Trims, strips `<>"'` and truncates to `max_length` characters.
pub fn sanitize_string(text: &str, max_length: Option<usize>) -> String {
    let cleaned = UNSAFE_CHARS_RE.replace_all(text.trim(), "");
    match max_length {
        Some(max) if max > 0 => cleaned.chars().take(max).collect(),
        _ => cleaned.into_owned(),
    }
}

/// Formats `dt` with a strftime pattern; `None` if the pattern is invalid.
pub fn format_datetime(dt: &DateTime<Utc>, format: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", dt.format(format)).ok()?;
    Some(out)
}

/// Parses a timestamp without zone information, reading it as UTC.
pub fn parse_datetime(text: &str, format: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text.trim(), format)
        .ok()
        .map(add_timezone_awareness)
}

pub fn add_timezone_awareness(dt: NaiveDateTime) -> DateTime<Utc> {
    dt.and_utc()
}

/// Full years between `birth_date` and today (UTC).
pub fn calculate_age(birth_date: NaiveDate) -> i32 {
    age_on(birth_date, Utc::now().date_naive())
}

pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let before_birthday = (today.month(), today.day()) < (birth_date.month(), birth_date.day());
    today.year() - birth_date.year() - i32::from(before_birthday)
}

/// Logs a call at INFO with sensitive keyword arguments masked, returning the
/// logged record.
pub fn log_function_call(
    function: &str,
    args: Option<&str>,
    kwargs: Option<&Map<String, Value>>,
    result: Option<&str>,
) -> Value {
    let mut record = Map::new();
    record.insert("function".to_string(), json!(function));
    record.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
    if let Some(args) = args.filter(|a| !a.is_empty()) {
        record.insert("args".to_string(), json!(args));
    }
    if let Some(kwargs) = kwargs.filter(|k| !k.is_empty()) {
        record.insert(
            "kwargs".to_string(),
            Value::Object(mask_sensitive_data(kwargs, None)),
        );
    }
    if let Some(result) = result {
        record.insert("result".to_string(), json!(result));
    }

    let record = Value::Object(record);
    tracing::info!(call = %record, "Function call");
    record
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Slices `items` into the 1-based `page` of size `per_page`.
pub fn paginate_results<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let total = items.len();
    let start = (page - 1).saturating_mul(per_page).min(total);
    let end = start.saturating_add(per_page).min(total);

    Page {
        items: items[start..end].to_vec(),
        total,
        page,
        per_page,
        pages: total.div_ceil(per_page),
        has_next: end < total,
        has_prev: page > 1,
    }
}

/// Clamps page to at least 1 and per_page to `1..=max_per_page`.
pub fn validate_pagination_params(page: i64, per_page: i64, max_per_page: usize) -> (usize, usize) {
    let page = usize::try_from(page.max(1)).unwrap_or(1);
    let per_page = usize::try_from(per_page.max(1))
        .unwrap_or(1)
        .min(max_per_page.max(1));
    (page, per_page)
}

pub fn create_response_metadata(
    total: usize,
    page: usize,
    per_page: usize,
    extra: Map<String, Value>,
) -> Value {
    let per_page = per_page.max(1);
    let pages = total.div_ceil(per_page);

    let mut metadata = Map::new();
    metadata.insert(
        "pagination".to_string(),
        json!({
            "total": total,
            "page": page,
            "per_page": per_page,
            "pages": pages,
            "has_next": page < pages,
            "has_prev": page > 1,
        }),
    );
    metadata.extend(extra);
    Value::Object(metadata)
}

/// Keeps the first and last two characters of longer values.
pub fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "***".to_string();
    }
    let mut masked: String = chars[..2].iter().collect();
    masked.push_str(&"*".repeat(chars.len() - 4));
    masked.extend(&chars[chars.len() - 2..]);
    masked
}

/// Masks every entry whose key contains one of `sensitive_fields`
/// (defaults to [`DEFAULT_SENSITIVE_FIELDS`]).
pub fn mask_sensitive_data(
    data: &Map<String, Value>,
    sensitive_fields: Option<&[&str]>,
) -> Map<String, Value> {
    let fields = sensitive_fields.unwrap_or(DEFAULT_SENSITIVE_FIELDS);

    data.iter()
        .map(|(key, value)| {
            let key_lc = key.to_lowercase();
            if !fields.iter().any(|f| key_lc.contains(f)) {
                return (key.clone(), value.clone());
            }
            let masked = match value {
                Value::String(s) => mask_value(s),
                _ => "***".to_string(),
            };
            (key.clone(), Value::String(masked))
        })
        .collect()
}

/// Names of `required_fields` that are absent, null or empty strings.
pub fn validate_required_fields(data: &Map<String, Value>, required_fields: &[&str]) -> Vec<String> {
    required_fields
        .iter()
        .filter(|field| match data.get(**field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        })
        .map(|field| field.to_string())
        .collect()
}

/// Drops null values and empty strings.
pub fn clean_map(data: Map<String, Value>) -> Map<String, Value> {
    data.into_iter()
        .filter(|(_, v)| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
        .collect()
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(5),
        }
    }

    pub fn none() -> Self {
        RetryPolicy::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(2, Duration::from_millis(250))
    }
}

/// Runs `op` until it succeeds, `should_retry` rejects the error, or the
/// policy's retries are used up. The last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: RetryPolicy,
    should_retry: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && should_retry(&err) => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed: {}. Retrying",
                    err
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if attempt > 0 {
                    tracing::error!("All {} attempts failed", attempt + 1);
                }
                return Err(err);
            }
        }
    }
}
