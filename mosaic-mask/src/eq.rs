use crate::Mask;

impl PartialEq for Mask {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() || self.true_count() != other.true_count() {
            return false;
        }
        match (self, other) {
            (Mask::Values(lhs), Mask::Values(rhs)) => lhs.boolean_buffer() == rhs.boolean_buffer(),
            // Mixed masks are never uniform, so equal counts mean equal uniform masks.
            _ => true,
        }
    }
}

impl Eq for Mask {}
