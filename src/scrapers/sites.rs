use super::ListingSite;

/// scholars4dev.com scholarship list (WordPress `.post` items)
pub fn scholars4dev() -> ListingSite {
    ListingSite {
        name: "scholars4dev".to_string(),
        tag: "s4d".to_string(),
        base_url: "https://www.scholars4dev.com".to_string(),
        listing_path: "/category/scholarships-list/".to_string(),
        item_selectors: vec![".post".to_string(), "article".to_string()],
        title_selectors: vec![".entry-title a".to_string(), "h2 a".to_string()],
        excerpt_selectors: vec![".entry-summary".to_string(), "p".to_string()],
        date_selectors: vec![".entry-date".to_string()],
        default_university: "Various Universities".to_string(),
    }
}

/// opportunitydesk.org fellowships and scholarships category
pub fn opportunity_desk() -> ListingSite {
    ListingSite {
        name: "opportunitydesk".to_string(),
        tag: "od".to_string(),
        base_url: "https://opportunitydesk.org".to_string(),
        listing_path: "/category/fellowships-and-scholarships/".to_string(),
        item_selectors: vec![
            ".opportunity-item".to_string(),
            "article".to_string(),
            ".post".to_string(),
        ],
        title_selectors: vec![
            "h2 a".to_string(),
            ".entry-title a".to_string(),
            "h1 a".to_string(),
        ],
        excerpt_selectors: vec![
            ".entry-summary".to_string(),
            ".excerpt".to_string(),
            "p".to_string(),
        ],
        date_selectors: vec![".deadline".to_string(), ".date".to_string()],
        default_university: "Various".to_string(),
    }
}
