use std::convert::Infallible;

use rocket::request::{FromRequest, Outcome, Request};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PageState {
    pub page_length: u32,
    pub page: u32,
}

impl Default for PageState {
    fn default() -> Self {
        PageState {
            page_length: 20,
            page: 0,
        }
    }
}

impl PageState {
    pub fn skip(&self) -> u64 {
        self.page as u64 * self.page_length as u64
    }

    pub fn total_pages(&self, total_items: u64) -> u64 {
        if self.page_length == 0 {
            return 0;
        }
        (total_items + self.page_length as u64 - 1) / self.page_length as u64
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PageState {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let length: Option<u32> = request
            .query_value("len")
            .map(|it| it.ok())
            .flatten()
            .or_else(|| request.query_value("l").map(|it| it.ok()).flatten());

        let page: Option<u32> = request
            .query_value("page")
            .map(|it| it.ok())
            .flatten()
            .or_else(|| request.query_value("p").map(|it| it.ok()).flatten());

        if let Some(p) = page {
            Outcome::Success(PageState {
                page_length: length.unwrap_or(20),
                page: p,
            })
        } else {
            Outcome::Success(Default::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let page = PageState {
            page_length: 10,
            page: 0,
        };

        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(10), 1);
        assert_eq!(page.total_pages(11), 2);
    }
}
