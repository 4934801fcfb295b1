use serde::{Deserialize, Serialize};
use time::Date;

use crate::modules::books::models::Book;
use crate::utils::{self, FieldErrors, FormField};
use bookshelf_http::error::AppError;

/// A stored author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub birth_date: Option<Date>,
    pub date_of_death: Option<Date>,
}

/// Validated input for creating an author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuthor {
    pub name: String,
    pub birth_date: Option<Date>,
    pub date_of_death: Option<Date>,
}

impl NewAuthor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            birth_date: None,
            date_of_death: None,
        }
    }
}

/// Add-author submission as posted by the form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorForm {
    #[serde(default, deserialize_with = "utils::lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "utils::lenient_text")]
    pub birth_date: Option<String>,
    #[serde(default, deserialize_with = "utils::lenient_text")]
    pub date_of_death: Option<String>,
}

pub const AUTHOR_FORM_FIELDS: [FormField; 3] = [
    FormField::required("name", "text"),
    FormField::optional("birth_date", "date"),
    FormField::optional("date_of_death", "date"),
];

impl AuthorForm {
    pub fn validate(&self) -> Result<NewAuthor, AppError> {
        let mut errors = FieldErrors::default();

        let name = utils::non_blank(self.name.as_deref());
        if name.is_none() {
            errors.add("name", "Name is required.");
        }

        let mut date = |field: &str, value: Option<&String>| {
            let value = utils::non_blank(value.map(String::as_str))?;
            match utils::parse_date(value) {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add(field, "Dates must use the YYYY-MM-DD format.");
                    None
                }
            }
        };
        let birth_date = date("birth_date", self.birth_date.as_ref());
        let date_of_death = date("date_of_death", self.date_of_death.as_ref());

        if let (Some(born), Some(died)) = (birth_date, date_of_death) {
            if died < born {
                errors.add("date_of_death", "Date of death cannot precede the birth date.");
            }
        }

        errors.finish("Please correct the highlighted author fields.")?;

        Ok(NewAuthor {
            name: name.unwrap_or_default().to_string(),
            birth_date,
            date_of_death,
        })
    }
}

/// Author detail view: the author and every book they wrote.
#[derive(Debug, Serialize)]
pub struct AuthorDetail {
    #[serde(flatten)]
    pub author: Author,
    pub books: Vec<Book>,
}

#[derive(Debug, Serialize)]
pub struct AuthorCreated {
    pub author: Author,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorFormData {
    pub fields: &'static [FormField],
}
