//! Identifier case conversion.
//!
//! Update payloads and filter keys may arrive with field-style identifiers
//! (`CreatedAt`, `userId`); columns are snake_case. The conversion here is the
//! deterministic transform record types resolve against.

/// Convert a field-style identifier to snake_case.
///
/// Acronym runs collapse (`UserID` -> `user_id`, `HTMLBody` -> `html_body`);
/// strings already in snake_case pass through unchanged.
pub(crate) fn to_snake_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);
    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            let boundary = match (i.checked_sub(1).map(|p| chars[p]), chars.get(i + 1)) {
                (Some(prev), _) if prev.is_lowercase() || prev.is_ascii_digit() => true,
                (Some(prev), Some(next)) if prev.is_uppercase() => next.is_lowercase(),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_snake_case("CreatedAt"), "created_at");
        assert_eq!(to_snake_case("Name"), "name");
        assert_eq!(to_snake_case("UpdatedBy"), "updated_by");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("ignoreZeroValue"), "ignore_zero_value");
    }

    #[test]
    fn test_acronyms() {
        assert_eq!(to_snake_case("UserID"), "user_id");
        assert_eq!(to_snake_case("HTMLBody"), "html_body");
        assert_eq!(to_snake_case("ID"), "id");
    }

    #[test]
    fn test_snake_case_passthrough() {
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("deleted"), "deleted");
        assert_eq!(to_snake_case(""), "");
    }

    #[test]
    fn test_digits() {
        assert_eq!(to_snake_case("Address2"), "address2");
        assert_eq!(to_snake_case("address2Line"), "address2_line");
    }
}
