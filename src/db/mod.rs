mod catalog;
mod schools;
mod sessions;
mod students;
mod users;

pub use catalog::*;
pub use schools::*;
pub use sessions::*;
pub use students::*;
pub use users::*;

fn search_term(q: Option<&str>) -> Option<&str> {
    q.map(str::trim).filter(|q| !q.is_empty())
}

/// Case-insensitive substring pattern for `LIKE ... ESCAPE '\'`. The
/// wildcards `%` and `_` in `q` match literally.
fn like_pattern(q: &str) -> String {
    let mut pattern = String::with_capacity(q.len() + 2);
    pattern.push('%');
    for c in q.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

