//! hh.ru 向けの抽出器
//!
//! 検索結果ページから求人URLを、求人ページから詳細レコードを取り出す。
//! どちらも入力HTMLだけに依存する純粋関数で、ネットワークには触れない。

mod detail;
mod listing;

pub use detail::{
    parse_salary_text, DetailExtractor, DetailOutcome, DetailStrategy, MarkupStrategy,
    PartialVacancy, StructuredDataStrategy, COMPANY_PLACEHOLDER, LOCATION_PLACEHOLDER,
    TITLE_PLACEHOLDER,
};
pub use listing::{ListingExtractor, ListingPage};
