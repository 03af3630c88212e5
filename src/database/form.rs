use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        FORBIDDEN_USERNAMES, MAX_AMOUNT, MAX_COOKING_TIME, MAX_LEN_EMAIL, MAX_LEN_NAME,
        MAX_LEN_USER_FIELD, MIN_AMOUNT, MIN_COOKING_TIME, MIN_LEN_USERNAME,
        USERNAME_EXTRA_CHARACTERS,
    },
    error::{ApiError, FieldErrors},
    schema::{Id, IngredientAmount},
};

const REQUIRED: &str = "This field is required.";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct IngredientEntry {
    pub id: Id,
    pub amount: i32,
}

/// Incoming recipe payload, ids only.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RecipeForm {
    pub ingredients: Option<Vec<IngredientEntry>>,
    pub tags: Option<Vec<Id>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

/// A recipe payload that passed every check not needing the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: Option<String>,
    pub tag_ids: Vec<Id>,
    pub parts: Vec<IngredientAmount>,
}

impl RecipeForm {
    pub fn validate(self, require_image: bool) -> Result<ValidRecipe, ApiError> {
        let mut errors = FieldErrors::new();

        let name = required_text(&mut errors, "name", self.name);
        if name.chars().count() > MAX_LEN_NAME {
            errors.add("name", format!("Ensure this field has no more than {MAX_LEN_NAME} characters."));
        }
        let text = required_text(&mut errors, "text", self.text);

        let cooking_time = match self.cooking_time {
            Some(t) if (MIN_COOKING_TIME..=MAX_COOKING_TIME).contains(&t) => t,
            Some(_) => {
                errors.add(
                    "cooking_time",
                    format!(
                        "Cooking time must be between {MIN_COOKING_TIME} and {MAX_COOKING_TIME} minutes."
                    ),
                );
                0
            }
            None => {
                errors.add("cooking_time", REQUIRED);
                0
            }
        };

        let image = self.image.filter(|image| !image.trim().is_empty());
        if require_image && image.is_none() {
            errors.add("image", REQUIRED);
        }

        let tag_ids = self.tags.unwrap_or_default();
        if tag_ids.is_empty() {
            errors.add("tags", "At least one tag is required.");
        } else if has_duplicates(tag_ids.iter()) {
            errors.add("tags", "Tags must not repeat.");
        }

        let entries = self.ingredients.unwrap_or_default();
        if entries.is_empty() {
            errors.add("ingredients", "At least one ingredient is required.");
        } else if has_duplicates(entries.iter().map(|entry| &entry.id)) {
            errors.add("ingredients", "Ingredients must not repeat.");
        }
        if entries
            .iter()
            .any(|entry| !(MIN_AMOUNT..=MAX_AMOUNT).contains(&entry.amount))
        {
            errors.add(
                "ingredients",
                format!("Amount must be between {MIN_AMOUNT} and {MAX_AMOUNT}."),
            );
        }

        errors.into_result()?;

        Ok(ValidRecipe {
            name,
            text,
            cooking_time,
            image,
            tag_ids,
            parts: entries
                .into_iter()
                .map(|entry| IngredientAmount {
                    ingredient_id: entry.id,
                    amount: entry.amount,
                })
                .collect(),
        })
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct UserForm {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl UserForm {
    pub fn validate(self) -> Result<ValidUser, ApiError> {
        let mut errors = FieldErrors::new();

        let email = required_text(&mut errors, "email", self.email);
        if !email.is_empty() && !is_email(&email) {
            errors.add("email", "Enter a valid email address.");
        }

        let username = required_text(&mut errors, "username", self.username);
        if !username.is_empty() {
            for message in username_problems(&username) {
                errors.add("username", message);
            }
        }

        let first_name = required_text(&mut errors, "first_name", self.first_name);
        let last_name = required_text(&mut errors, "last_name", self.last_name);
        for (field, value) in [("first_name", &first_name), ("last_name", &last_name)] {
            if value.chars().count() > MAX_LEN_USER_FIELD {
                errors.add(
                    field,
                    format!("Ensure this field has no more than {MAX_LEN_USER_FIELD} characters."),
                );
            }
        }

        let password = self.password.unwrap_or_default();
        if password.is_empty() {
            errors.add("password", REQUIRED);
        }

        errors.into_result()?;

        Ok(ValidUser {
            email,
            username,
            first_name,
            last_name,
            password,
        })
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PasswordForm {
    pub new_password: Option<String>,
    pub current_password: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LoginForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AvatarForm {
    pub avatar: Option<String>,
}

pub fn username_problems(username: &str) -> Vec<String> {
    let mut problems = vec![];

    if FORBIDDEN_USERNAMES.contains(&username) {
        problems.push(format!("Using '{username}' as a username is not allowed."));
    }
    let length = username.chars().count();
    if length < MIN_LEN_USERNAME {
        problems.push(format!(
            "Ensure this field has at least {MIN_LEN_USERNAME} characters."
        ));
    }
    if length > MAX_LEN_USER_FIELD {
        problems.push(format!(
            "Ensure this field has no more than {MAX_LEN_USER_FIELD} characters."
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || USERNAME_EXTRA_CHARACTERS.contains(&c))
    {
        problems.push(String::from(
            "Username may contain only letters, digits and . @ + - _",
        ));
    }

    problems
}

fn is_email(value: &str) -> bool {
    if value.chars().count() > MAX_LEN_EMAIL || value.contains(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && domain.contains('.')
        }
        None => false,
    }
}

fn required_text(errors: &mut FieldErrors, field: &str, value: Option<String>) -> String {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        errors.add(field, REQUIRED);
    }
    value
}

fn has_duplicates<'a, I>(ids: I) -> bool
where
    I: Iterator<Item = &'a Id>,
{
    let mut seen = HashSet::new();
    ids.into_iter().any(|id| !seen.insert(*id))
}
