//! Statically declared form schemas and their validators.
//!
//! A validator takes fielded input and yields either a draft that is ready to
//! persist or a map of field errors. Nothing here touches storage; choices
//! that live in the database (groups) are passed in by the caller.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::app::media::{check_image, CheckedImage, ImageUpload};
use crate::domain::group::Group;
use crate::domain::post::Post;

pub const REQUIRED: &str = "this field is required";
pub const POST_TEXT_REQUIRED: &str = "this field must be filled in";
pub const INVALID_CHOICE: &str = "select a valid choice";
pub const INVALID_IMAGE: &str =
    "upload a valid image: the file was either not an image or a corrupted image";

/// Key for errors that belong to the form as a whole.
pub const NON_FIELD_ERRORS: &str = "__all__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Password,
    Email,
    Choice,
    Image,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub max_length: Option<usize>,
}

pub const POST_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "group",
        label: "Group",
        help_text: "Choose a group",
        kind: FieldKind::Choice,
        required: false,
        max_length: None,
    },
    FieldSpec {
        name: "text",
        label: "Text",
        help_text: "Write your text",
        kind: FieldKind::Textarea,
        required: true,
        max_length: None,
    },
    FieldSpec {
        name: "image",
        label: "Image",
        help_text: "",
        kind: FieldKind::Image,
        required: false,
        max_length: None,
    },
];

pub const COMMENT_FIELDS: &[FieldSpec] = &[FieldSpec {
    name: "text",
    label: "Text",
    help_text: "",
    kind: FieldKind::Textarea,
    required: true,
    max_length: None,
}];

pub const LOGIN_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "username",
        label: "Username",
        help_text: "",
        kind: FieldKind::Text,
        required: true,
        max_length: Some(150),
    },
    FieldSpec {
        name: "password",
        label: "Password",
        help_text: "",
        kind: FieldKind::Password,
        required: true,
        max_length: None,
    },
];

pub const SIGNUP_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "username",
        label: "Username",
        help_text: "150 characters or fewer. Letters, digits and @/./+/-/_ only.",
        kind: FieldKind::Text,
        required: true,
        max_length: Some(150),
    },
    FieldSpec {
        name: "email",
        label: "Email",
        help_text: "",
        kind: FieldKind::Email,
        required: true,
        max_length: Some(254),
    },
    FieldSpec {
        name: "password",
        label: "Password",
        help_text: "At least 8 characters.",
        kind: FieldKind::Password,
        required: true,
        max_length: Some(128),
    },
];

/// Usernames that would shadow a top-level route.
pub const RESERVED_USERNAMES: &[&str] = &[
    "about", "admin", "auth", "follow", "group", "health", "media", "new", "static",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldContext {
    #[serde(flatten)]
    pub spec: FieldSpec,
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Everything a template needs to draw a form.
#[derive(Debug, Clone, Serialize)]
pub struct FormContext {
    pub is_bound: bool,
    pub fields: Vec<FieldContext>,
    pub errors: FormErrors,
}

impl FormContext {
    fn build(
        schema: &[FieldSpec],
        is_bound: bool,
        mut value_of: impl FnMut(&str) -> Option<String>,
        errors: FormErrors,
    ) -> Self {
        let fields = schema
            .iter()
            .map(|spec| FieldContext {
                spec: *spec,
                value: value_of(spec.name),
                choices: Vec::new(),
                errors: errors.get(spec.name).map(<[String]>::to_vec).unwrap_or_default(),
            })
            .collect();
        Self {
            is_bound,
            fields,
            errors,
        }
    }

    fn with_choices(mut self, field: &str, choices: Vec<Choice>) -> Self {
        if let Some(context) = self.fields.iter_mut().find(|f| f.spec.name == field) {
            context.choices = choices;
        }
        self
    }

    #[cfg(test)]
    pub fn field(&self, name: &str) -> Option<&FieldContext> {
        self.fields.iter().find(|f| f.spec.name == name)
    }
}

fn group_choices(groups: &[Group]) -> Vec<Choice> {
    std::iter::once(Choice {
        value: String::new(),
        label: "---------".to_string(),
    })
    .chain(groups.iter().map(|group| Choice {
        value: group.id.to_string(),
        label: group.title.clone(),
    }))
    .collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Raw submission of the post form.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub text: Option<String>,
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
    pub clear_image: bool,
}

/// What to do with a post's image on save.
#[derive(Debug, Clone)]
pub enum ImageChange {
    Keep,
    Clear,
    Replace(CheckedImage),
}

#[derive(Debug, Clone)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: ImageChange,
}

impl PostInput {
    pub fn validate(self, groups: &[Group]) -> Result<PostDraft, FormErrors> {
        let mut errors = FormErrors::default();

        let text = match non_blank(self.text.as_deref()) {
            Some(text) => text.to_string(),
            None => {
                errors.add("text", POST_TEXT_REQUIRED);
                String::new()
            }
        };

        let group_id = match non_blank(self.group.as_deref()) {
            None => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) if groups.iter().any(|group| group.id == id) => Some(id),
                _ => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            },
        };

        // an uploaded file wins over the clear checkbox
        let image = match self.image {
            Some(upload) => match check_image(upload) {
                Ok(checked) => ImageChange::Replace(checked),
                Err(_) => {
                    errors.add("image", INVALID_IMAGE);
                    ImageChange::Keep
                }
            },
            None if self.clear_image => ImageChange::Clear,
            None => ImageChange::Keep,
        };

        errors.into_result(PostDraft {
            text,
            group_id,
            image,
        })
    }

    /// Re-render context for a submission that failed validation.
    pub fn bound_context(&self, groups: &[Group], errors: FormErrors) -> FormContext {
        FormContext::build(
            POST_FIELDS,
            true,
            |name| match name {
                "text" => self.text.clone(),
                "group" => self.group.clone(),
                _ => None,
            },
            errors,
        )
        .with_choices("group", group_choices(groups))
    }
}

pub fn empty_post_form(groups: &[Group]) -> FormContext {
    FormContext::build(POST_FIELDS, false, |_| None, FormErrors::default())
        .with_choices("group", group_choices(groups))
}

/// The post form pre-filled from a stored post.
pub fn post_form_for(post: &Post, groups: &[Group]) -> FormContext {
    FormContext::build(
        POST_FIELDS,
        false,
        |name| match name {
            "text" => Some(post.text.clone()),
            "group" => post.group.as_ref().map(|group| group.id.to_string()),
            "image" => post.image.clone(),
            _ => None,
        },
        FormErrors::default(),
    )
    .with_choices("group", group_choices(groups))
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CommentInput {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommentDraft {
    pub text: String,
}

impl CommentInput {
    pub fn validate(&self) -> Result<CommentDraft, FormErrors> {
        let mut errors = FormErrors::default();
        let text = match non_blank(self.text.as_deref()) {
            Some(text) => text.to_string(),
            None => {
                errors.add("text", REQUIRED);
                String::new()
            }
        };
        errors.into_result(CommentDraft { text })
    }

    pub fn bound_context(&self, errors: FormErrors) -> FormContext {
        let text = self.text.clone();
        FormContext::build(
            COMMENT_FIELDS,
            true,
            move |name| if name == "text" { text.clone() } else { None },
            errors,
        )
    }
}

pub fn empty_comment_form() -> FormContext {
    FormContext::build(COMMENT_FIELDS, false, |_| None, FormErrors::default())
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    pub fn validate(&self) -> Result<Credentials, FormErrors> {
        let mut errors = FormErrors::default();
        let username = non_blank(self.username.as_deref()).map(str::to_string);
        // passwords are taken verbatim
        let password = self.password.clone().filter(|password| !password.is_empty());
        if username.is_none() {
            errors.add("username", REQUIRED);
        }
        if password.is_none() {
            errors.add("password", REQUIRED);
        }
        errors.into_result(Credentials {
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
        })
    }

    pub fn bound_context(&self, errors: FormErrors) -> FormContext {
        let username = self.username.clone();
        FormContext::build(
            LOGIN_FIELDS,
            true,
            move |name| if name == "username" { username.clone() } else { None },
            errors,
        )
    }
}

pub fn empty_login_form() -> FormContext {
    FormContext::build(LOGIN_FIELDS, false, |_| None, FormErrors::default())
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SignupInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignupDraft {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.chars().count() <= 150
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

impl SignupInput {
    pub fn validate(&self) -> Result<SignupDraft, FormErrors> {
        let mut errors = FormErrors::default();

        let username = non_blank(self.username.as_deref()).unwrap_or_default();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if !is_valid_username(username) {
            errors.add(
                "username",
                "enter a valid username: letters, digits and @/./+/-/_ only",
            );
        } else if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
            errors.add("username", "this username is reserved");
        }

        let email = non_blank(self.email.as_deref()).unwrap_or_default();
        if email.is_empty() {
            errors.add("email", REQUIRED);
        } else if email.len() > 254 || !looks_like_email(email) {
            errors.add("email", "enter a valid email address");
        }

        let password = self.password.clone().unwrap_or_default();
        if password.is_empty() {
            errors.add("password", REQUIRED);
        } else if password.chars().count() < 8 {
            errors.add("password", "this password is too short: it must contain at least 8 characters");
        } else if password.len() > 128 {
            errors.add("password", "password must be at most 128 characters");
        }

        errors.into_result(SignupDraft {
            username: username.to_string(),
            email: email.to_string(),
            password,
        })
    }

    pub fn bound_context(&self, errors: FormErrors) -> FormContext {
        let username = self.username.clone();
        let email = self.email.clone();
        FormContext::build(
            SIGNUP_FIELDS,
            true,
            move |name| match name {
                "username" => username.clone(),
                "email" => email.clone(),
                _ => None,
            },
            errors,
        )
    }
}

pub fn empty_signup_form() -> FormContext {
    FormContext::build(SIGNUP_FIELDS, false, |_| None, FormErrors::default())
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
