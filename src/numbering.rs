//! Numbering Assigner — deterministic ordering plus the department-local
//! display number for the active view.
//!
//! Numbers are never recomputed here. They are read from the matching
//! department assignment's server-assigned number, so a new registration
//! cannot shift the numbers already shown to other patients.

use crate::classifier::DepartmentBucket;
use crate::models::UnifiedAppointment;

/// Display number of one appointment for the given view: the assignment
/// whose bucket matches, else the first available assignment.
pub fn number_for(appt: &UnifiedAppointment, view: Option<DepartmentBucket>) -> Option<u32> {
    if let Some(bucket) = view {
        if let Some(a) = appt.assignments.iter().find(|a| a.bucket == Some(bucket)) {
            return Some(a.number);
        }
    }
    appt.assignments.first().map(|a| a.number)
}

/// Produce a new list, ordered by earliest arrival (queue entry time over
/// created-at, entry id as the final tie-break) with each appointment's
/// `display_number` filled for the active view. The input is not mutated.
pub fn assign(
    appointments: &[UnifiedAppointment],
    view: Option<DepartmentBucket>,
) -> Vec<UnifiedAppointment> {
    let mut out: Vec<UnifiedAppointment> = appointments.to_vec();
    out.sort_by(|a, b| {
        a.arrival_time()
            .cmp(&b.arrival_time())
            .then_with(|| a.primary_id.cmp(&b.primary_id))
    });
    for appt in &mut out {
        appt.display_number = number_for(appt, view);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssignmentSource, DepartmentAssignment, EntryStatus};

    fn appt(id: &str, arrival: &str, assignments: Vec<(Option<DepartmentBucket>, u32)>) -> UnifiedAppointment {
        let mut a = UnifiedAppointment::blank(id, "2024-06-01".parse().unwrap());
        a.created_at = arrival.parse().unwrap();
        a.assignments = assignments
            .into_iter()
            .map(|(bucket, number)| DepartmentAssignment {
                department_tag: bucket.map(|b| b.as_str().to_string()).unwrap_or_default(),
                bucket,
                number,
                status: EntryStatus::Waiting,
                source: AssignmentSource::Desk,
                service_label: None,
            })
            .collect();
        a
    }

    #[test]
    fn number_comes_from_matching_assignment() {
        let a = appt(
            "e1",
            "2024-06-01T08:00:00Z",
            vec![
                (Some(DepartmentBucket::Cardiology), 3),
                (Some(DepartmentBucket::Dental), 7),
            ],
        );
        assert_eq!(number_for(&a, Some(DepartmentBucket::Dental)), Some(7));
        assert_eq!(number_for(&a, Some(DepartmentBucket::Cardiology)), Some(3));
    }

    #[test]
    fn falls_back_to_first_assignment() {
        let a = appt(
            "e1",
            "2024-06-01T08:00:00Z",
            vec![(Some(DepartmentBucket::Cardiology), 3)],
        );
        assert_eq!(number_for(&a, Some(DepartmentBucket::Laboratory)), Some(3));
        assert_eq!(number_for(&a, None), Some(3));
    }

    #[test]
    fn new_arrival_does_not_shift_existing_numbers() {
        let before = vec![
            appt("e1", "2024-06-01T08:00:00Z", vec![(Some(DepartmentBucket::Cardiology), 1)]),
            appt("e2", "2024-06-01T08:10:00Z", vec![(Some(DepartmentBucket::Cardiology), 2)]),
        ];
        let assigned_before = assign(&before, Some(DepartmentBucket::Cardiology));

        let mut after = before.clone();
        after.push(appt(
            "e3",
            "2024-06-01T08:05:00Z",
            vec![(Some(DepartmentBucket::Cardiology), 3)],
        ));
        let assigned_after = assign(&after, Some(DepartmentBucket::Cardiology));

        for old in &assigned_before {
            let new = assigned_after
                .iter()
                .find(|a| a.primary_id == old.primary_id)
                .unwrap();
            assert_eq!(new.display_number, old.display_number);
        }
    }

    #[test]
    fn ordering_is_fully_deterministic_on_ties() {
        let a = appt("e2", "2024-06-01T08:00:00Z", vec![(None, 1)]);
        let b = appt("e1", "2024-06-01T08:00:00Z", vec![(None, 2)]);
        let assigned = assign(&[a, b], None);
        assert_eq!(assigned[0].primary_id, "e1");
        assert_eq!(assigned[1].primary_id, "e2");
    }

    #[test]
    fn queue_entry_time_preferred_over_created_at() {
        let mut late_created = appt("e1", "2024-06-01T09:00:00Z", vec![(None, 1)]);
        late_created.queued_at = Some("2024-06-01T07:00:00Z".parse().unwrap());
        let early_created = appt("e2", "2024-06-01T08:00:00Z", vec![(None, 2)]);

        let assigned = assign(&[early_created, late_created], None);
        assert_eq!(assigned[0].primary_id, "e1");
    }

    #[test]
    fn input_list_is_left_untouched() {
        let input = vec![appt("e1", "2024-06-01T08:00:00Z", vec![(None, 5)])];
        let assigned = assign(&input, None);
        assert_eq!(input[0].display_number, None);
        assert_eq!(assigned[0].display_number, Some(5));
    }
}
