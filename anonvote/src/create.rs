use crate::*;
use std::collections::HashSet;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_CANDIDATE_LEN: usize = 50;

pub const DEFAULT_DURATION_HOURS: i64 = 24;

/// One year
pub const MAX_DURATION_HOURS: i64 = 8760;

/// A validated form, ready to submit
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub title: String,
    pub description: String,
    pub candidates: Vec<String>,
    pub duration_seconds: u64,
}

/// State of the "create voting" form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateForm {
    pub title: String,
    pub description: String,
    pub duration_hours: i64,
    pub candidates: Vec<String>,
}

impl Default for CreateForm {
    fn default() -> Self {
        CreateForm {
            title: String::new(),
            description: String::new(),
            duration_hours: DEFAULT_DURATION_HOURS,
            candidates: vec![String::new(); MIN_CANDIDATES],
        }
    }
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

impl CreateForm {
    pub fn new() -> Self {
        CreateForm::default()
    }

    /// A filled-in form. Candidate rows are taken as given, so an oversized list
    /// is reported by `validate` rather than silently dropped.
    pub fn filled(title: &str, description: &str, duration_hours: i64, candidates: &[String]) -> Self {
        let mut form = CreateForm::new();
        form.set_title(title);
        form.set_description(description);
        form.duration_hours = duration_hours;
        form.candidates = candidates
            .iter()
            .map(|c| truncate(c, MAX_CANDIDATE_LEN))
            .collect();
        while form.candidates.len() < MIN_CANDIDATES {
            form.candidates.push(String::new());
        }
        form
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = truncate(title, MAX_TITLE_LEN);
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = truncate(description, MAX_DESCRIPTION_LEN);
    }

    pub fn set_duration_hours(&mut self, hours: i64) {
        self.duration_hours = hours;
    }

    /// Returns false if there is no such row
    pub fn set_candidate(&mut self, row: usize, name: &str) -> bool {
        match self.candidates.get_mut(row) {
            Some(slot) => {
                *slot = truncate(name, MAX_CANDIDATE_LEN);
                true
            }
            None => false,
        }
    }

    /// Add an empty candidate row, up to the contract's maximum
    pub fn add_candidate(&mut self) -> bool {
        if self.candidates.len() >= MAX_CANDIDATES {
            return false;
        }
        self.candidates.push(String::new());
        true
    }

    /// Remove a candidate row, never going below the minimum
    pub fn remove_candidate(&mut self, row: usize) -> bool {
        if self.candidates.len() <= MIN_CANDIDATES || row >= self.candidates.len() {
            return false;
        }
        self.candidates.remove(row);
        true
    }

    /// Check the form. The first failing rule is returned.
    pub fn validate(&self) -> Result<CreateRequest, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        let description = self.description.trim();
        if description.is_empty() {
            return Err(ValidationError::EmptyDescription);
        }

        if self.duration_hours < 1 {
            return Err(ValidationError::DurationTooShort);
        }
        if self.duration_hours > MAX_DURATION_HOURS {
            return Err(ValidationError::DurationTooLong(MAX_DURATION_HOURS));
        }

        let candidates: Vec<String> = self
            .candidates
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_owned)
            .collect();
        if candidates.len() < MIN_CANDIDATES {
            return Err(ValidationError::TooFewCandidates);
        }
        if candidates.len() > MAX_CANDIDATES {
            return Err(ValidationError::TooManyCandidates);
        }
        let unique: HashSet<&String> = candidates.iter().collect();
        if unique.len() != candidates.len() {
            return Err(ValidationError::DuplicateCandidates);
        }

        Ok(CreateRequest {
            title: title.to_owned(),
            description: description.to_owned(),
            candidates,
            duration_seconds: self.duration_hours as u64 * 3600,
        })
    }

    /// Validate and submit. On success the form is reset.
    pub async fn submit<B: ContractBackend>(
        &mut self,
        gateway: &Gateway<B>,
    ) -> Result<TxReceipt, Error> {
        let request = self.validate()?;
        let receipt = gateway
            .create_voting(
                &request.title,
                &request.description,
                &request.candidates,
                request.duration_seconds,
            )
            .await?;
        *self = CreateForm::new();
        Ok(receipt)
    }
}
