use serde::Deserialize;

use crate::{
    constants::REMOTE_CATEGORY,
    models::quotes::{Quote, QuoteId},
};

/// a record served by the remote read endpoint. only `id` and `title` are used.
#[derive(Clone, Debug, Deserialize)]
pub struct RemotePost {
    pub id: QuoteId,
    pub title: String,
}

impl From<RemotePost> for Quote {
    fn from(post: RemotePost) -> Self {
        Quote::new(post.id, post.title, REMOTE_CATEGORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::UNKNOWN_AUTHOR;

    #[test]
    fn maps_title_and_id_into_a_quote() {
        let posts: Vec<RemotePost> = serde_json::from_str(
            r#"[{"userId": 1, "id": 7, "title": "sunt aut facere", "body": "quia et suscipit"}]"#,
        )
        .unwrap();

        let quote = Quote::from(posts[0].clone());

        assert_eq!(quote.id, QuoteId::Number(7));
        assert_eq!(quote.text, "sunt aut facere");
        assert_eq!(quote.category, REMOTE_CATEGORY);
        assert_eq!(quote.author, UNKNOWN_AUTHOR);
    }

    #[test]
    fn accepts_string_ids() {
        let posts: Vec<RemotePost> =
            serde_json::from_str(r#"[{"id": "abc", "title": "t"}, {"id": 2, "title": "u"}]"#)
                .unwrap();

        let quotes: Vec<Quote> = posts.into_iter().map(Quote::from).collect();

        assert_eq!(quotes[0].id, QuoteId::from("abc"));
        assert_eq!(quotes[1].id, QuoteId::Number(2));
    }
}
