use super::batch::Batch;
use super::student::Student;
use super::test::Test;
use crate::error::ServiceError;

/// Pre-flight checks for membership changes. All of these are pure reads
/// over entities loaded inside the same transaction as the write that
/// follows them.

pub fn check_eligibility(student: &Student) -> Result<(), ServiceError> {
    if student.is_eligible() {
        Ok(())
    } else {
        Err(ServiceError::Eligibility {
            student: student.id,
        })
    }
}

/// `additional` must already exclude students present in the batch;
/// re-assigning an existing member costs no capacity.
pub fn check_capacity(batch: &Batch, additional: usize) -> Result<(), ServiceError> {
    if batch.students.len() + additional > batch.max_students as usize {
        Err(ServiceError::Capacity {
            batch: batch.id,
            max_students: batch.max_students,
        })
    } else {
        Ok(())
    }
}

/// Inactive batches accept no new members; existing memberships survive
/// deactivation until the batch is deleted.
pub fn check_batch_open(batch: &Batch) -> Result<(), ServiceError> {
    if batch.is_active {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "batch {} is inactive and accepts no new assignments",
            batch.id
        )))
    }
}

pub fn check_test_active(test: &Test) -> Result<(), ServiceError> {
    if test.is_active {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "test {} is inactive and cannot be assigned",
            test.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn student(approved: bool, blocked: bool) -> Student {
        let mut s = Student::new("subject", "student@example.com", "Student");
        s.is_approved = approved;
        s.is_blocked = blocked;
        s
    }

    fn batch(member_count: usize, max_students: u32) -> Batch {
        Batch {
            id: Uuid::new_v4(),
            name: "morning".to_string(),
            description: String::new(),
            created_by: Uuid::new_v4(),
            students: (0..member_count).map(|_| Uuid::new_v4()).collect(),
            tests: vec![],
            is_active: true,
            max_students,
            start_date: None,
            end_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn eligibility_requires_approved_and_not_blocked() {
        assert!(check_eligibility(&student(true, false)).is_ok());
        assert!(matches!(
            check_eligibility(&student(false, false)),
            Err(ServiceError::Eligibility { .. })
        ));
        assert!(matches!(
            check_eligibility(&student(true, true)),
            Err(ServiceError::Eligibility { .. })
        ));
    }

    #[test]
    fn capacity_is_exact_at_the_ceiling() {
        let b = batch(0, 2);
        assert!(check_capacity(&b, 2).is_ok());
        assert!(matches!(
            check_capacity(&b, 3),
            Err(ServiceError::Capacity { .. })
        ));

        let full = batch(2, 2);
        assert!(check_capacity(&full, 0).is_ok());
        assert!(check_capacity(&full, 1).is_err());
    }

    #[test]
    fn inactive_batch_rejects_new_assignments() {
        let mut b = batch(0, 10);
        b.is_active = false;
        assert!(check_batch_open(&b).is_err());
    }
}
