//! Registration, login and profiles

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use types::errors::{MarketError, MarketResult};
use types::ids::UserId;
use types::user::{NewUser, ProfileUpdate, PublicUser, User};

use crate::engine::Marketplace;
use crate::password::{DUMMY_HASH, hash_password, verify_password};

const MAX_NAME_LEN: usize = 80;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_EMAIL_LEN: usize = 254;

impl Marketplace {
    pub fn register(&mut self, new: NewUser, now: DateTime<Utc>) -> MarketResult<PublicUser> {
        let name = validate_name(&new.name)?;
        let email = normalize_email(&new.email)?;
        let len = new.password.chars().count();
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
            return Err(MarketError::validation(format!(
                "password must be {}..={} characters",
                MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
            )));
        }
        if self.state.emails.contains_key(&email) {
            return Err(MarketError::conflict("email is already registered"));
        }

        let user = User {
            id: UserId::at(now),
            name,
            email: email.clone(),
            role: new.role,
            company: non_empty(new.company),
            phone: non_empty(new.phone),
            avatar_url: None,
            password_hash: hash_password(&new.password),
            created_at: now,
            updated_at: now,
        };
        let public = PublicUser::from(&user);
        info!(user_id = %user.id, role = %user.role, "user registered");
        self.state.emails.insert(email, user.id);
        self.state.users.insert(user.id, user);
        Ok(public)
    }

    /// Check credentials. Unknown email and wrong password are indistinguishable.
    pub fn authenticate(&self, email: &str, password: &str) -> MarketResult<PublicUser> {
        let failed = || MarketError::Unauthenticated("invalid email or password".to_string());
        let email = email.trim().to_lowercase();
        let Some(user) = self
            .state
            .emails
            .get(&email)
            .and_then(|id| self.state.users.get(id))
        else {
            std::hint::black_box(verify_password(password, DUMMY_HASH));
            return Err(failed());
        };
        if !verify_password(password, &user.password_hash) {
            debug!(user_id = %user.id, "password mismatch");
            return Err(failed());
        }
        Ok(PublicUser::from(user))
    }

    pub fn user(&self, id: UserId) -> MarketResult<PublicUser> {
        self.user_record(id).map(PublicUser::from)
    }

    pub fn update_profile(
        &mut self,
        id: UserId,
        update: ProfileUpdate,
        now: DateTime<Utc>,
    ) -> MarketResult<PublicUser> {
        let name = update.name.as_deref().map(validate_name).transpose()?;
        if let Some(url) = update.avatar_url.as_deref().filter(|u| !u.trim().is_empty()) {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(MarketError::validation("avatar_url must be an http(s) url"));
            }
        }

        let user = self
            .state
            .users
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("User", id))?;
        if let Some(name) = name {
            user.name = name;
        }
        // An empty string clears an optional field
        if update.company.is_some() {
            user.company = non_empty(update.company);
        }
        if update.phone.is_some() {
            user.phone = non_empty(update.phone);
        }
        if update.avatar_url.is_some() {
            user.avatar_url = non_empty(update.avatar_url);
        }
        user.updated_at = now;
        Ok(PublicUser::from(&*user))
    }
}

fn validate_name(name: &str) -> MarketResult<String> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(MarketError::validation(format!(
            "name must be 1..={} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn normalize_email(email: &str) -> MarketResult<String> {
    let email = email.trim().to_lowercase();
    let valid = email.len() <= MAX_EMAIL_LEN
        && !email.contains(char::is_whitespace)
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };
    if !valid {
        return Err(MarketError::validation("invalid email address"));
    }
    Ok(email)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
