use crate::db::LearningStore;
use crate::services::learners::{LearnerService, NewCourse};

struct DemoCourse {
    title: &'static str,
    description: &'static str,
    difficulty: &'static str,
    duration_minutes: i64,
}

const DEMO_COURSES: &[DemoCourse] = &[
    DemoCourse {
        title: "Introduction to Python",
        description: "Variables, control flow and functions for first-time programmers",
        difficulty: "beginner",
        duration_minutes: 120,
    },
    DemoCourse {
        title: "Data Science Fundamentals",
        description: "Data cleaning, exploration and basic statistical modelling",
        difficulty: "intermediate",
        duration_minutes: 180,
    },
    DemoCourse {
        title: "AI Research Methods",
        description: "Reading papers, designing experiments and reporting results",
        difficulty: "advanced",
        duration_minutes: 200,
    },
    DemoCourse {
        title: "Computer Vision Basics",
        description: "Images as arrays, filtering, edges and simple detectors",
        difficulty: "intermediate",
        duration_minutes: 150,
    },
];

const DEMO_LEARNERS: &[(&str, i32)] = &[("Alice Johnson", 70), ("Bob Smith", 60), ("Carol Davis", 80)];

/// Learners that get the first two courses.
const ENROLLED_DEMO_LEARNERS: usize = 2;

/// Populate an empty store with a small catalogue and a few learners.
/// A store that already has courses is left alone.
pub async fn seed_demo_data<S: LearningStore>(learners: &LearnerService<S>) {
    match learners.list_courses().await {
        Ok(courses) if !courses.is_empty() => {
            tracing::debug!(courses = courses.len(), "catalogue present, skipping demo data");
            return;
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(error = %err, "failed to inspect catalogue, skipping demo data");
            return;
        }
    }

    let mut courses = Vec::with_capacity(DEMO_COURSES.len());
    for demo in DEMO_COURSES {
        let input = NewCourse {
            title: demo.title.to_string(),
            description: Some(demo.description.to_string()),
            difficulty: Some(demo.difficulty.to_string()),
            duration_minutes: Some(demo.duration_minutes),
        };
        match learners.create_course(input).await {
            Ok(course) => courses.push(course),
            Err(err) => tracing::warn!(error = %err, title = demo.title, "failed to seed course"),
        }
    }

    for (index, (name, capacity)) in DEMO_LEARNERS.iter().enumerate() {
        let profile = match learners.create_learner(name, *capacity).await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(error = %err, name, "failed to seed learner");
                continue;
            }
        };

        if index >= ENROLLED_DEMO_LEARNERS {
            continue;
        }
        // the first course enrolled ends up active
        for course in courses.iter().take(2).rev() {
            if let Err(err) = learners
                .start_course(&profile.learner_id, &course.course_id)
                .await
            {
                tracing::warn!(error = %err, name, course = %course.title, "failed to seed enrollment");
            }
        }
    }

    tracing::info!(
        courses = courses.len(),
        learners = DEMO_LEARNERS.len(),
        "seeded demo data"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::MemoryLearningStore;
    use crate::services::LearnerLocks;

    #[tokio::test]
    async fn test_seed_is_applied_once() {
        let service = LearnerService::new(Arc::new(MemoryLearningStore::new()), Arc::new(LearnerLocks::new()));
        seed_demo_data(&service).await;
        seed_demo_data(&service).await;

        let courses = service.list_courses().await.unwrap();
        assert_eq!(courses.len(), DEMO_COURSES.len());
        assert_eq!(courses[0].title, "Introduction to Python");

        let learners = service.list_learners().await.unwrap();
        assert_eq!(learners.len(), DEMO_LEARNERS.len());

        let alice = learners.iter().find(|l| l.name == "Alice Johnson").unwrap();
        assert_eq!(alice.active_course_id.as_deref(), Some(courses[0].course_id.as_str()));
        let listing = service.learner_courses(&alice.learner_id).await.unwrap();
        assert_eq!(listing.iter().filter(|c| c.enrolled).count(), 2);

        let carol = learners.iter().find(|l| l.name == "Carol Davis").unwrap();
        assert_eq!(carol.active_course_id, None);
    }
}
