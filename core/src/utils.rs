//! Utility functions and helpers

/// String utilities
pub mod string {
    /// Check if a string is a valid registered channel name
    pub fn is_valid_channel_name(name: &str) -> bool {
        let Some(rest) = name.strip_prefix('#') else {
            return false;
        };

        // Channel name should not contain spaces or control characters
        rest.chars().all(|c| !c.is_control() && c != ' ' && c != ',')
    }

    /// Check if a string is a valid IRC nickname
    pub fn is_valid_nickname(nick: &str, max_length: usize) -> bool {
        if nick.is_empty() || nick.len() > max_length {
            return false;
        }

        let mut chars = nick.chars();

        // First character must be letter or special character
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || "[]\\`_^{|}~".contains(first) => {}
            _ => return false,
        }

        // Remaining characters must be letter, digit, or special character
        chars.all(|c| c.is_ascii_alphanumeric() || "-[]\\`_^{|}~".contains(c))
    }

    /// Check if a string is usable as an account name.
    ///
    /// With nickname ownership the account name doubles as a nickname, so
    /// nickname rules apply. Without it any printable token is accepted.
    pub fn is_valid_account_name(name: &str, max_length: usize, nick_ownership: bool) -> bool {
        if nick_ownership {
            return is_valid_nickname(name, max_length);
        }

        !name.is_empty()
            && name.len() <= max_length
            && !name.starts_with('#')
            && name.chars().all(|c| !c.is_control() && c != ' ' && c != '@' && c != '!')
    }

    /// Whether a parameter stands for "no value" (empty or a single character)
    pub fn is_placeholder(value: &str) -> bool {
        value.chars().nth(1).is_none()
    }

    /// Check for line-protocol injection characters
    pub fn contains_line_break(value: &str) -> bool {
        value.contains('\r') || value.contains('\n')
    }

    /// Strip IRC formatting codes (bold, colour, reset, reverse, italic, underline)
    pub fn strip_formatting(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\x02' | '\x0f' | '\x16' | '\x1d' | '\x1f' => {}
                '\x03' => {
                    // foreground: up to two digits, optional ",bg" with up to two digits
                    for _ in 0..2 {
                        if chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                            chars.next();
                        }
                    }
                    if chars.peek() == Some(&',') {
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        if lookahead.peek().is_some_and(|d| d.is_ascii_digit()) {
                            chars.next();
                            for _ in 0..2 {
                                if chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                                    chars.next();
                                }
                            }
                        }
                    }
                }
                c if c.is_control() && c != '\n' => {}
                c => out.push(c),
            }
        }

        out
    }
}

/// Time utilities
pub mod time {
    use chrono::Utc;

    /// Get current timestamp as Unix timestamp
    pub fn current_unix_timestamp() -> i64 {
        Utc::now().timestamp()
    }
}
