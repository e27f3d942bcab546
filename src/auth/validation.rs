use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use time::{macros::format_description, Date};

use crate::auth::{
    dto::{AccountPayload, LoginRequest},
    repo_types::{AccountChanges, NewAccount, DEFAULT_ROLE},
};

const EMAIL_MAX: usize = 60;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 250;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

#[derive(Default)]
struct Violations(Vec<FieldViolation>);

impl Violations {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldViolation {
            field,
            message: message.into(),
        });
    }

    fn max_len(&mut self, field: &'static str, value: Option<&str>, max: usize) {
        if let Some(v) = value {
            if v.chars().count() > max {
                self.push(field, format!("must be at most {max} characters"));
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, Vec<FieldViolation>> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self.0)
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_email(v: &mut Violations, email: &str) {
    if email.chars().count() > EMAIL_MAX {
        v.push("email", format!("must be at most {EMAIL_MAX} characters"));
    } else if !is_valid_email(email) {
        v.push("email", "must be a valid email address");
    }
}

fn check_password(v: &mut Violations, password: &str) {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        v.push("password", format!("must be at least {PASSWORD_MIN} characters"));
    } else if len > PASSWORD_MAX {
        v.push("password", format!("must be at most {PASSWORD_MAX} characters"));
    }
}

fn parse_birthday(v: &mut Violations, raw: Option<String>) -> Option<Date> {
    let raw = non_blank(raw)?;
    match Date::parse(&raw, format_description!("[year]-[month]-[day]")) {
        Ok(date) => Some(date),
        Err(_) => {
            v.push("birthday", "must be a date formatted YYYY-MM-DD");
            None
        }
    }
}

struct Profile {
    first_name: Option<String>,
    last_name: Option<String>,
    role: Option<String>,
    about: Option<String>,
    phone_number: Option<String>,
    address: Option<String>,
    city: Option<String>,
    gender: Option<String>,
    postcode: Option<i32>,
    birthday: Option<Date>,
}

fn check_profile(v: &mut Violations, p: &mut AccountPayload) -> Profile {
    let profile = Profile {
        first_name: non_blank(p.first_name.take()),
        last_name: non_blank(p.last_name.take()),
        role: non_blank(p.role.take()),
        about: non_blank(p.about.take()),
        phone_number: non_blank(p.phone_number.take()),
        address: non_blank(p.address.take()),
        city: non_blank(p.city.take()),
        gender: non_blank(p.gender.take()),
        postcode: p.postcode.take(),
        birthday: parse_birthday(v, p.birthday.take()),
    };
    v.max_len("first_name", profile.first_name.as_deref(), 30);
    v.max_len("last_name", profile.last_name.as_deref(), 30);
    v.max_len("role", profile.role.as_deref(), 10);
    v.max_len("about", profile.about.as_deref(), 1024);
    v.max_len("phone_number", profile.phone_number.as_deref(), 20);
    v.max_len("address", profile.address.as_deref(), 250);
    v.max_len("city", profile.city.as_deref(), 24);
    v.max_len("gender", profile.gender.as_deref(), 10);
    if profile.postcode.is_some_and(|code| code < 0) {
        v.push("postcode", "must not be negative");
    }
    profile
}

/// Validate and normalize a registration payload.
pub fn prepare_create(mut payload: AccountPayload) -> Result<NewAccount, Vec<FieldViolation>> {
    let mut v = Violations::default();

    let email = payload.email.take().map(|e| normalize_email(&e)).unwrap_or_default();
    if email.is_empty() {
        v.push("email", "is required");
    } else {
        check_email(&mut v, &email);
    }

    let password = payload.password.take().unwrap_or_default();
    if password.is_empty() {
        v.push("password", "is required");
    } else {
        check_password(&mut v, &password);
    }

    let profile = check_profile(&mut v, &mut payload);

    v.finish(NewAccount {
        first_name: profile.first_name.unwrap_or_default(),
        last_name: profile.last_name.unwrap_or_default(),
        email,
        password,
        role: profile.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        about: profile.about,
        phone_number: profile.phone_number,
        address: profile.address,
        city: profile.city,
        gender: profile.gender,
        postcode: profile.postcode,
        birthday: profile.birthday,
    })
}

/// Validate and normalize an update payload. Absent or blank fields stay
/// unchanged; the password cannot be changed here.
pub fn prepare_update(mut payload: AccountPayload) -> Result<AccountChanges, Vec<FieldViolation>> {
    let mut v = Violations::default();

    let email = payload
        .email
        .take()
        .map(|e| normalize_email(&e))
        .filter(|e| !e.is_empty());
    if let Some(email) = &email {
        check_email(&mut v, email);
    }
    if payload.password.take().is_some_and(|p| !p.is_empty()) {
        v.push("password", "cannot be changed through update");
    }

    let profile = check_profile(&mut v, &mut payload);

    v.finish(AccountChanges {
        first_name: profile.first_name,
        last_name: profile.last_name,
        email,
        role: profile.role,
        about: profile.about,
        phone_number: profile.phone_number,
        address: profile.address,
        city: profile.city,
        gender: profile.gender,
        postcode: profile.postcode.filter(|code| *code != 0),
        birthday: profile.birthday,
    })
}

/// Shape check only; says nothing about whether the account exists.
pub fn validate_login(req: &mut LoginRequest) -> Result<(), Vec<FieldViolation>> {
    let mut v = Violations::default();
    req.email = normalize_email(&req.email);
    if req.email.is_empty() {
        v.push("email", "is required");
    } else {
        check_email(&mut v, &req.email);
    }
    if req.password.is_empty() {
        v.push("password", "is required");
    } else {
        check_password(&mut v, &req.password);
    }
    v.finish(())
}
