use thiserror::Error;

/// Failures while fulfilling a weather query, after the date resolved.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// No location was supplied in the form
    #[error("Please tell me which city you want the weather for.")]
    MissingLocation,

    /// The geocoder returned no match
    #[error("Sorry, I can't find a place called '{0}'.")]
    UnknownLocation(String),

    /// The geocoding call itself failed
    #[error("Location lookup failed: {0}")]
    Geocoding(String),

    /// The weather service failed or returned something unusable
    #[error("Weather service error: {0}")]
    Service(String),
}

impl WeatherError {
    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            WeatherError::MissingLocation => "missing_location",
            WeatherError::UnknownLocation(_) => "unknown_location",
            WeatherError::Geocoding(_) => "geocoding",
            WeatherError::Service(_) => "service",
        }
    }
}

#[derive(Debug, Error)]
pub enum KnowledgeBaseError {
    #[error("Unknown object type '{0}'")]
    UnknownType(String),

    #[error("'{attribute}' is not a relation attribute of '{object_type}'")]
    UnknownRelation {
        object_type: String,
        attribute: String,
    },

    #[error("Invalid identifier '{0}' in knowledge base query")]
    InvalidIdentifier(String),

    #[error("Invalid knowledge base schema: {0}")]
    InvalidSchema(String),

    #[error("Graph store error: {0}")]
    Store(String),
}
