//! Placeholder rendering for query templates.

use std::borrow::Cow;

/// How an engine spells bind parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`, bound in order (MySQL, SQLite).
    Positional,
    /// `$1`, `$2`, ... (PostgreSQL).
    Numbered,
}

impl PlaceholderStyle {
    /// Render a `?`-style template for this engine.
    ///
    /// Question marks inside single-quoted literals are left alone; a doubled
    /// quote (`''`) inside a literal toggles twice and so stays inside it.
    pub fn render(self, template: &str) -> Cow<'_, str> {
        match self {
            PlaceholderStyle::Positional => Cow::Borrowed(template),
            PlaceholderStyle::Numbered => Cow::Owned(number_placeholders(template)),
        }
    }
}

fn number_placeholders(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let mut next = 0usize;
    let mut in_literal = false;

    for ch in template.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                out.push(ch);
            }
            '?' if !in_literal => {
                next += 1;
                out.push('$');
                out.push_str(&next.to_string());
            }
            _ => out.push(ch),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_templates_pass_through_untouched() {
        let sql = "SELECT user_id FROM users WHERE user_email = ?";
        assert!(matches!(
            PlaceholderStyle::Positional.render(sql),
            Cow::Borrowed(s) if s == sql
        ));
    }

    #[test]
    fn numbered_style_counts_in_order() {
        let rendered = PlaceholderStyle::Numbered
            .render("INSERT INTO pets (pet_name, pet_desc, pet_image) VALUES (?, ?, ?)");
        assert_eq!(
            rendered,
            "INSERT INTO pets (pet_name, pet_desc, pet_image) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn question_marks_inside_literals_are_not_parameters() {
        let rendered = PlaceholderStyle::Numbered
            .render("SELECT 'why?', 'it''s?' FROM pets WHERE pet_id = ? AND pet_name <> '?'");
        assert_eq!(
            rendered,
            "SELECT 'why?', 'it''s?' FROM pets WHERE pet_id = $1 AND pet_name <> '?'"
        );
    }
}
