use crate::utils::error::{EtlError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> EtlError {
    EtlError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(
            field_name,
            url_str,
            format!("Invalid URL format: {}", e),
        )),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

/// Output templates such as `output/si-{id}.jpg` need balanced braces
/// around a non-empty column name.
pub fn validate_template(field_name: &str, template: &str) -> Result<()> {
    validate_path(field_name, template)?;

    let mut open = false;
    let mut name_len = 0;
    for c in template.chars() {
        match c {
            '{' if open => return Err(invalid(field_name, template, "Nested '{' in template")),
            '{' => {
                open = true;
                name_len = 0;
            }
            '}' if !open => return Err(invalid(field_name, template, "Unmatched '}' in template")),
            '}' => {
                if name_len == 0 {
                    return Err(invalid(field_name, template, "Empty placeholder '{}'"));
                }
                open = false;
            }
            _ if open => name_len += 1,
            _ => {}
        }
    }

    if open {
        return Err(invalid(field_name, template, "Unclosed '{' in template"));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("src", "https://example.com/index.txt").is_ok());
        assert!(validate_url("src", "http://example.com").is_ok());
        assert!(validate_url("src", "").is_err());
        assert!(validate_url("src", "invalid-url").is_err());
        assert!(validate_url("src", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_template() {
        assert!(validate_template("out", "output/si-{id}.jpg").is_ok());
        assert!(validate_template("out", "output/plain.jpg").is_ok());
        assert!(validate_template("out", "output/{}.jpg").is_err());
        assert!(validate_template("out", "output/{id.jpg").is_err());
        assert!(validate_template("out", "output/id}.jpg").is_err());
        assert!(validate_template("out", "").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("max_dimension", 4096, 64, 16384).is_ok());
        assert!(validate_range("max_dimension", 0, 64, 16384).is_err());
        assert!(validate_range("threshold", 0.5, 0.0, 1.0).is_ok());
        assert!(validate_range("threshold", 1.5, 0.0, 1.0).is_err());
    }
}
