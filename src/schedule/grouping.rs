use std::collections::BTreeMap;

use crate::records::RecordId;

use super::types::MergedAssignment;

/// One teacher's assignments, bucketed by timeslot id.
///
/// Assignments whose timeslot did not resolve are kept under `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeacherSlots {
    pub slots: BTreeMap<Option<RecordId>, Vec<MergedAssignment>>,
}

impl TeacherSlots {
    pub fn take_slot(&mut self, timeslot: &RecordId) -> Vec<MergedAssignment> {
        self.slots.remove(&Some(timeslot.clone())).unwrap_or_default()
    }

    /// Everything that was not taken by a column.
    pub fn into_leftovers(self) -> impl Iterator<Item = MergedAssignment> {
        self.slots.into_values().flatten()
    }
}

/// Merged assignments grouped by teacher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeacherGroups {
    pub by_teacher: BTreeMap<RecordId, TeacherSlots>,
    /// Assignments whose teacher reference did not resolve.
    pub unassigned: Vec<MergedAssignment>,
}

impl TeacherGroups {
    pub fn teacher_count(&self) -> usize {
        self.by_teacher.len()
    }
}

/// Groups merged assignments by teacher, then by timeslot, keeping merge order
/// inside each bucket.
pub fn group_by_teacher(merged: Vec<MergedAssignment>) -> TeacherGroups {
    let mut groups = TeacherGroups::default();

    for assignment in merged {
        let Some(teacher_id) = assignment.teacher_id().cloned() else {
            groups.unassigned.push(assignment);
            continue;
        };
        let timeslot_id = assignment.timeslot_id().cloned();
        groups
            .by_teacher
            .entry(teacher_id)
            .or_default()
            .slots
            .entry(timeslot_id)
            .or_default()
            .push(assignment);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{NamedRef, Teacher, Timeslot};
    use crate::schedule::types::AssignmentKind;

    fn assignment(teacher: Option<&str>, timeslot: Option<&str>, student: &str) -> MergedAssignment {
        MergedAssignment {
            subject: None,
            teacher: teacher.map(|id| Teacher {
                id: RecordId::new(id),
                name: id.to_uppercase(),
            }),
            timeslot: timeslot.map(|id| Timeslot {
                id: RecordId::new(id),
                start: String::new(),
                end: String::new(),
            }),
            room: None,
            kind: AssignmentKind::Individual {
                student: Some(NamedRef {
                    id: RecordId::new(student),
                    name: student.to_string(),
                }),
            },
        }
    }

    #[test]
    fn groups_by_teacher_and_timeslot_in_merge_order() {
        let groups = group_by_teacher(vec![
            assignment(Some("a"), Some("ts1"), "s1"),
            assignment(Some("b"), Some("ts1"), "s2"),
            assignment(Some("a"), Some("ts1"), "s3"),
            assignment(Some("a"), Some("ts2"), "s4"),
        ]);

        assert_eq!(groups.teacher_count(), 2);
        let mut a = groups.by_teacher[&RecordId::new("a")].clone();
        let ts1 = a.take_slot(&RecordId::new("ts1"));
        assert_eq!(ts1.len(), 2);
        assert_eq!(ts1[0], assignment(Some("a"), Some("ts1"), "s1"));
        assert_eq!(ts1[1], assignment(Some("a"), Some("ts1"), "s3"));
        assert_eq!(a.take_slot(&RecordId::new("ts2")).len(), 1);
        assert!(a.take_slot(&RecordId::new("ts3")).is_empty());
    }

    #[test]
    fn missing_teacher_goes_to_unassigned() {
        let groups = group_by_teacher(vec![
            assignment(None, Some("ts1"), "s1"),
            assignment(Some("a"), None, "s2"),
        ]);
        assert_eq!(groups.unassigned.len(), 1);
        let leftovers: Vec<_> = groups.by_teacher[&RecordId::new("a")]
            .clone()
            .into_leftovers()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }
}
