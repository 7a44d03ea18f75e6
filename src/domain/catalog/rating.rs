use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::CatalogError;

// ============================================================================
// Product Ratings
// ============================================================================
//
// One rating per (product, user); rating again replaces the stars.
//
// ============================================================================

pub const MIN_STARS: i16 = 1;
pub const MAX_STARS: i16 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRating {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub stars: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRating {
    pub fn new(product_id: Uuid, user_id: Uuid, stars: i32) -> Result<Self, CatalogError> {
        let stars = i16::try_from(stars)
            .ok()
            .filter(|s| (MIN_STARS..=MAX_STARS).contains(s))
            .ok_or(CatalogError::InvalidRating(stars))?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            product_id,
            user_id,
            stars,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Body of a rating submission.
#[derive(Debug, Clone, Deserialize)]
pub struct RatingRequest {
    pub username: String,
    pub stars: i32,
}

/// Average stars (two decimals) and number of ratings of a product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: Decimal,
    pub count: i64,
}

impl RatingSummary {
    pub fn empty() -> Self {
        Self {
            average: Decimal::ZERO,
            count: 0,
        }
    }

    pub fn from_stars(stars: impl IntoIterator<Item = i16>) -> Self {
        let (sum, count) = stars
            .into_iter()
            .fold((0i64, 0i64), |(sum, count), s| (sum + i64::from(s), count + 1));
        if count == 0 {
            return Self::empty();
        }
        let mut average = (Decimal::from(sum) / Decimal::from(count)).round_dp(2);
        average.rescale(2);
        Self { average, count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stars_must_be_one_to_five() {
        for stars in [1, 5] {
            assert!(ProductRating::new(Uuid::new_v4(), Uuid::new_v4(), stars).is_ok());
        }
        for stars in [0, 6, -1, 70_000] {
            let result = ProductRating::new(Uuid::new_v4(), Uuid::new_v4(), stars);
            assert!(matches!(result, Err(CatalogError::InvalidRating(s)) if s == stars));
        }
    }

    #[test]
    fn test_summary_average() {
        let summary = RatingSummary::from_stars([5, 4, 4]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average, Decimal::new(433, 2));
        assert_eq!(RatingSummary::from_stars([4]).average.to_string(), "4.00");

        assert_eq!(RatingSummary::from_stars([]), RatingSummary::empty());
    }
}
