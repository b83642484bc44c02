//! Case conversion for model names: `BlogPost` -> `blog_post` for default path segments and table names.

/// Convert a single identifier from CamelCase/camelCase to snake_case.
/// e.g. "BlogPost" -> "blog_post", "userId" -> "user_id"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::to_snake_case;

    #[test]
    fn converts_model_names() {
        assert_eq!(to_snake_case("Book"), "book");
        assert_eq!(to_snake_case("BlogPost"), "blog_post");
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("HTTPLog"), "httplog");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }
}
