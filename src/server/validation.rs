use crate::auth::MIN_PASSWORD_LEN;

const MAX_USERNAME_LEN: usize = 32;
const MAX_PASSWORD_LEN: usize = 256;
const MAX_TITLE_LEN: usize = 200;
const MAX_CLUE_NAME_LEN: usize = 100;

fn is_valid_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
}

fn validate_text(value: &str, entity: &str, max_len: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{entity} is required."));
    }
    if value.chars().count() > max_len {
        return Err(format!("{entity} cannot exceed {max_len} characters."));
    }
    Ok(())
}

pub fn validate_credentials(username: &str, password: &str) -> Result<(), String> {
    if username.is_empty() || password.is_empty() {
        return Err("Username and password are required".to_string());
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(format!(
            "Username cannot exceed {MAX_USERNAME_LEN} characters."
        ));
    }
    if !username.chars().all(is_valid_username_char) {
        return Err(
            "Username can only contain letters, numbers, periods, hyphens, and underscores."
                .to_string(),
        );
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        ));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(format!(
            "Password cannot exceed {MAX_PASSWORD_LEN} characters."
        ));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), String> {
    validate_text(title, "Title", MAX_TITLE_LEN)
}

pub fn validate_clue_name(name: &str) -> Result<(), String> {
    validate_text(name, "Clue name", MAX_CLUE_NAME_LEN)
}
