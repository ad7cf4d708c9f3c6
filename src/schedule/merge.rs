use std::collections::HashMap;

use crate::records::{Assignment, GroupLesson, IndividualLesson};

use super::types::{AssignmentKey, AssignmentKind, MergedAssignment};

/// Key under which an assignment is deduplicated.
pub fn assignment_key(assignment: &Assignment) -> AssignmentKey {
    match assignment {
        Assignment::Individual(lesson) => AssignmentKey::Individual {
            student: lesson.student.as_ref().map(|s| s.id.clone()),
            subject: lesson.subject.as_ref().map(|s| s.id.clone()),
            timeslot: lesson.timeslot.as_ref().map(|t| t.id.clone()),
        },
        Assignment::Group(lesson) => AssignmentKey::Group {
            record: lesson.id.clone(),
            subject: lesson.subject.as_ref().map(|s| s.id.clone()),
            timeslot: lesson.timeslot.as_ref().map(|t| t.id.clone()),
        },
    }
}

fn from_individual(lesson: IndividualLesson) -> MergedAssignment {
    MergedAssignment {
        subject: lesson.subject,
        teacher: lesson.teacher,
        timeslot: lesson.timeslot,
        room: lesson.room,
        kind: AssignmentKind::Individual {
            student: lesson.student,
        },
    }
}

fn from_group(lesson: GroupLesson) -> MergedAssignment {
    MergedAssignment {
        subject: lesson.subject,
        teacher: lesson.teacher,
        timeslot: lesson.timeslot,
        room: lesson.room,
        kind: AssignmentKind::Group {
            group_id: lesson.id,
            students: lesson.students,
        },
    }
}

impl From<Assignment> for MergedAssignment {
    fn from(assignment: Assignment) -> Self {
        match assignment {
            Assignment::Individual(lesson) => from_individual(lesson),
            Assignment::Group(lesson) => from_group(lesson),
        }
    }
}

/// Merges both feeds into one deduplicated list.
///
/// Individual lessons are inserted first, then group lessons, each in fetch
/// order. A later assignment with the same key replaces the earlier one but
/// keeps its position, so the output order depends only on the input order.
pub fn merge_assignments(
    individual: Vec<Assignment>,
    group: Vec<Assignment>,
) -> Vec<MergedAssignment> {
    let mut positions: HashMap<AssignmentKey, usize> = HashMap::new();
    let mut merged: Vec<MergedAssignment> = Vec::with_capacity(individual.len() + group.len());

    for assignment in individual.into_iter().chain(group) {
        let key = assignment_key(&assignment);
        let entry = MergedAssignment::from(assignment);
        match positions.get(&key) {
            Some(&index) => merged[index] = entry,
            None => {
                positions.insert(key, merged.len());
                merged.push(entry);
            }
        }
    }

    merged
}
