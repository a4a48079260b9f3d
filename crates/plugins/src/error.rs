use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Search(#[from] picsearch_search::SearchError),
}

pub type Result<T> = std::result::Result<T, Error>;
