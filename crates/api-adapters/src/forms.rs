//! Form payloads as browsers send them, and their conversion into the
//! validated domain inputs.

use std::collections::HashMap;

use axum::extract::Multipart;
use domains::{Category, DomainError, DomainResult, NewListing, NewReview, NewUser, Upload};
use mime::Mime;
use serde::Deserialize;

use crate::error::ApiError;

const FIELD_TITLE: &str = "listing[title]";
const FIELD_DESCRIPTION: &str = "listing[description]";
const FIELD_PRICE: &str = "listing[price]";
const FIELD_LOCATION: &str = "listing[location]";
const FIELD_COUNTRY: &str = "listing[country]";
const FIELD_CATEGORIES: &str = "listing[categories]";
const FIELD_IMAGE: &str = "listing[image]";

/// The multipart body of the new/edit listing forms.
#[derive(Debug, Default)]
pub struct ListingForm {
    fields: HashMap<String, String>,
    categories: Vec<String>,
    image: Option<Upload>,
}

impl ListingForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ListingForm::default();
        let bad_body = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(e.body_text());

        while let Some(field) = multipart.next_field().await.map_err(bad_body)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match name.as_str() {
                FIELD_IMAGE => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let declared = field.content_type().and_then(|c| c.parse::<Mime>().ok());
                    let bytes = field.bytes().await.map_err(bad_body)?;
                    // browsers send an empty part when no file was picked
                    if bytes.is_empty() {
                        continue;
                    }
                    let content_type = declared.unwrap_or_else(|| {
                        mime_guess::from_path(&file_name).first_or_octet_stream()
                    });
                    form.image = Some(Upload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                _ => {
                    let value = field.text().await.map_err(bad_body)?;
                    form.push_text(&name, value);
                }
            }
        }
        Ok(form)
    }

    fn push_text(&mut self, name: &str, value: String) {
        if name == FIELD_CATEGORIES || name == "listing[categories][]" {
            self.categories.push(value);
        } else {
            self.fields.insert(name.to_string(), value);
        }
    }

    fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Parses the text fields. Field presence and ranges are checked later by
    /// [`NewListing::validate`]; this only rejects what cannot be typed.
    pub fn into_parts(self) -> DomainResult<(NewListing, Option<Upload>)> {
        let raw_price = self.text(FIELD_PRICE);
        let price = match raw_price.trim() {
            "" => return Err(DomainError::validation("\"price\" is required")),
            p => p
                .parse::<i64>()
                .map_err(|_| DomainError::validation("Price must be a whole number"))?,
        };

        let categories = self
            .categories
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.parse::<Category>())
            .collect::<DomainResult<Vec<_>>>()?;

        let input = NewListing {
            title: self.text(FIELD_TITLE),
            description: self.text(FIELD_DESCRIPTION),
            price,
            location: self.text(FIELD_LOCATION),
            country: self.text(FIELD_COUNTRY),
            categories,
        };
        Ok((input, self.image))
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(rename = "review[comment]", default)]
    pub comment: String,
    #[serde(rename = "review[rating]", default)]
    pub rating: String,
}

impl ReviewForm {
    pub fn into_review(self) -> DomainResult<NewReview> {
        let rating = self
            .rating
            .trim()
            .parse::<i16>()
            .map_err(|_| DomainError::validation("Rating must be between 1 and 5"))?;
        Ok(NewReview {
            comment: self.comment,
            rating,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl From<SignupForm> for NewUser {
    fn from(form: SignupForm) -> Self {
        NewUser {
            username: form.username.trim().to_string(),
            email: form.email.trim().to_string(),
            password: form.password,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
