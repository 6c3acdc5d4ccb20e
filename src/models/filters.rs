/// 1-based pagination window for unfiltered listings.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { number: 1, size: 20 }
    }
}

impl Page {
    pub fn offset(&self) -> u32 {
        self.number.saturating_sub(1) * self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_has_zero_offset() {
        assert_eq!(Page { number: 1, size: 20 }.offset(), 0);
    }

    #[test]
    fn later_pages_offset_by_size() {
        assert_eq!(Page { number: 3, size: 25 }.offset(), 50);
    }

    #[test]
    fn page_zero_clamps_to_first() {
        assert_eq!(Page { number: 0, size: 20 }.offset(), 0);
    }
}
