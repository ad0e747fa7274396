use serde::{Deserialize, Serialize};

use crate::catalog::{Film, FilmFields};
use crate::session::{Flash, SessionUser};

/// Which view to render and the data it needs. Serialized as `"view": "<name>"`
/// next to the page fields.
#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Page {
    Index {
        #[serde(skip_serializing_if = "Option::is_none")]
        films: Option<Vec<Film>>,
    },
    Register,
    Login,
    Add,
    Film {
        film: Option<Film>,
    },
    Update {
        film: Option<Film>,
    },
}

#[derive(Debug, Serialize)]
pub struct View {
    #[serde(flatten)]
    pub page: Page,
    pub user: Option<SessionUser>,
    pub flashes: Vec<Flash>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub films: i64,
}

// Form bodies. Missing fields deserialize as empty strings so that they fail
// validation like blank ones.

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AddFilmForm {
    #[serde(default)]
    pub film_title: String,
    #[serde(default)]
    pub film_author: String,
    #[serde(default)]
    pub film_date: String,
    #[serde(default)]
    pub film_synopsis: String,
}

impl From<AddFilmForm> for FilmFields {
    fn from(form: AddFilmForm) -> Self {
        FilmFields {
            title: form.film_title,
            director: form.film_author,
            release_date: form.film_date,
            synopsis: form.film_synopsis,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateFilmForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub realisateur: String,
    #[serde(default)]
    pub date_sortie: String,
    #[serde(default)]
    pub synopsis: String,
}

impl From<UpdateFilmForm> for FilmFields {
    fn from(form: UpdateFilmForm) -> Self {
        FilmFields {
            title: form.title,
            director: form.realisateur,
            release_date: form.date_sortie,
            synopsis: form.synopsis,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub film_title: String,
}
