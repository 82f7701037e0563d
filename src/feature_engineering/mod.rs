//! Feature engineering for the bank-churn data
//!
//! - Row-wise derived columns (`churn`)
//! - TF-IDF text vectorization with sparse output (`text_features`)
//! - Truncated SVD on sparse matrices (`svd`)
//! - Dense text embeddings built from the two (`embedding`)

pub mod churn;
pub mod embedding;
pub mod svd;
pub mod text_features;

pub use churn::{
    age_category, engineer_features, salary_token, AGE_CATEGORY, IS_ACTIVE_BY_CR_CARD, IS_SENIOR,
    PRODUCTS_PER_TENURE, SURNAME_LENGTH, SUR_GEO_GEND_SAL,
};
pub use embedding::{TextEmbedder, EMBEDDING_PREFIX};
pub use svd::{SvdConfig, TruncatedSvd};
pub use text_features::{CsrMatrix, TextTokenizer, TfidfVectorizer};
