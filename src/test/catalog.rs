#[cfg(test)]
mod tests {
    use crate::db::{
        create_classroom, create_grade, create_school_year, create_subject, delete_classroom,
        delete_cycle, delete_school, find_cycle, get_student, get_subject, list_classrooms,
        list_cycles, list_grades, list_school_years, update_classroom, update_school_year,
    };
    use crate::error::AppError;
    use crate::models::{ClassroomInput, GradeInput, SchoolYearInput, SubjectInput};
    use crate::test::test_db::{TestDb, TestDbBuilder, date};

    use rocket::tokio;

    async fn catalog_db() -> TestDb {
        TestDbBuilder::new()
            .school("Lycée Alpha")
            .school("École Beta")
            .school_year("Lycée Alpha", "2022-2023", date(2022, 10, 1), false)
            .school_year("Lycée Alpha", "2023-2024", date(2023, 10, 1), false)
            .school_year("Lycée Alpha", "2024-2025", date(2024, 10, 1), true)
            .cycle("Secondaire", 20)
            .cycle("Fondamental (1er Cycle)", 10)
            .cycle("Cours du soir", 100)
            .classroom("Lycée Alpha", "10ème A", Some("Secondaire"))
            .classroom("Lycée Alpha", "11ème A", Some("Secondaire"))
            .classroom("École Beta", "1ère Année", Some("Fondamental (1er Cycle)"))
            .student("Traoré", "Awa", Some("10ème A"))
            .build()
            .await
            .expect("Failed to build test database")
    }

    fn year_input(school_id: i64, label: &str, start_year: i32, is_active: bool) -> SchoolYearInput {
        SchoolYearInput {
            school_id,
            label: label.to_string(),
            start_date: date(start_year, 10, 1),
            end_date: date(start_year + 1, 7, 15),
            is_active,
        }
    }

    #[tokio::test]
    async fn test_duplicate_school_year_label_is_rejected() {
        let test_db = catalog_db().await;
        let alpha = test_db.school_id("Lycée Alpha");

        let result = create_school_year(&test_db.pool, &year_input(alpha, "2024-2025", 2024, true)).await;

        match result {
            Err(AppError::Duplicate { field, .. }) => assert_eq!(field, "label"),
            other => panic!("Expected duplicate label, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_same_label_in_another_school_is_allowed() {
        let test_db = catalog_db().await;
        let beta = test_db.school_id("École Beta");

        create_school_year(&test_db.pool, &year_input(beta, "2024-2025", 2024, true))
            .await
            .expect("Labels are unique per school only");
    }

    #[tokio::test]
    async fn test_new_school_year_is_listed_active_first_then_latest() {
        let test_db = catalog_db().await;
        let alpha = test_db.school_id("Lycée Alpha");

        create_school_year(&test_db.pool, &year_input(alpha, "2025-2026", 2025, false))
            .await
            .expect("Failed to create school year");

        let page = list_school_years(&test_db.pool, Some(alpha), None)
            .await
            .unwrap();
        let labels: Vec<&str> = page.items.iter().map(|y| y.label.as_str()).collect();

        assert_eq!(labels, vec!["2024-2025", "2025-2026", "2023-2024", "2022-2023"]);
        assert_eq!(page.total, 4);
        assert_eq!(page.num_pages, 1);
    }

    #[tokio::test]
    async fn test_update_school_year_keeps_its_own_label() {
        let test_db = catalog_db().await;
        let alpha = test_db.school_id("Lycée Alpha");
        let id = test_db.school_year_id("2023-2024");

        update_school_year(&test_db.pool, id, &year_input(alpha, "2023-2024", 2023, true))
            .await
            .expect("Saving a year under its own label is not a duplicate");

        let clash = update_school_year(&test_db.pool, id, &year_input(alpha, "2024-2025", 2023, true)).await;
        assert!(matches!(clash, Err(AppError::Duplicate { field: "label", .. })));
    }

    #[tokio::test]
    async fn test_school_years_are_paginated_by_fifty() {
        let test_db = TestDbBuilder::new().school("Grande École").build().await.unwrap();
        let school_id = test_db.school_id("Grande École");

        for i in 0..55 {
            create_school_year(&test_db.pool, &year_input(school_id, &format!("Y{:02}", i), 1950 + i, false))
                .await
                .unwrap();
        }

        let first = list_school_years(&test_db.pool, None, Some(1)).await.unwrap();
        let second = list_school_years(&test_db.pool, None, Some(2)).await.unwrap();

        assert_eq!(first.items.len(), 50);
        assert_eq!(second.items.len(), 5);
        assert_eq!(first.num_pages, 2);
        assert_eq!(first.items[0].label, "Y54");
    }

    #[tokio::test]
    async fn test_referenced_cycle_cannot_be_deleted() {
        let test_db = catalog_db().await;
        let cycle_id = test_db.cycle_id("Secondaire");

        let result = delete_cycle(&test_db.pool, cycle_id).await;

        assert!(matches!(result, Err(AppError::Integrity(_))));
        assert!(find_cycle(&test_db.pool, cycle_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unreferenced_cycle_is_deleted() {
        let test_db = catalog_db().await;
        let cycle_id = test_db.cycle_id("Cours du soir");

        delete_cycle(&test_db.pool, cycle_id)
            .await
            .expect("Unused cycle should be deletable");

        assert!(find_cycle(&test_db.pool, cycle_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cycle_search_by_name_or_notation() {
        let test_db = catalog_db().await;

        let by_name = list_cycles(&test_db.pool, Some("fondamental"), None).await.unwrap();
        assert_eq!(by_name.total, 1);
        assert_eq!(by_name.items[0].name, "Fondamental (1er Cycle)");

        let by_notation = list_cycles(&test_db.pool, Some("100"), None).await.unwrap();
        assert_eq!(by_notation.total, 1);
        assert_eq!(by_notation.items[0].name, "Cours du soir");

        let all = list_cycles(&test_db.pool, Some("  "), None).await.unwrap();
        let names: Vec<&str> = all.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Cours du soir", "Fondamental (1er Cycle)", "Secondaire"]);
    }

    #[tokio::test]
    async fn test_cycle_and_classroom_search_wildcards_are_literal() {
        let test_db = catalog_db().await;

        let cycles = list_cycles(&test_db.pool, Some("_"), None).await.unwrap();
        assert_eq!(cycles.total, 0);

        let cycles = list_cycles(&test_db.pool, Some("%"), None).await.unwrap();
        assert_eq!(cycles.total, 0);

        let classrooms = list_classrooms(&test_db.pool, Some("1_ème"), None, None).await.unwrap();
        assert_eq!(classrooms.total, 0);
    }

    #[tokio::test]
    async fn test_deleting_classroom_keeps_its_students() {
        let test_db = catalog_db().await;
        let classroom_id = test_db.classroom_id("10ème A");
        let student_id = test_db.student_id("Traoré");

        delete_classroom(&test_db.pool, classroom_id)
            .await
            .expect("Failed to delete classroom");

        let student = get_student(&test_db.pool, student_id)
            .await
            .expect("Student should survive classroom deletion");
        assert_eq!(student.classroom_id, None);
        assert_eq!(student.classroom_label, None);
    }

    #[tokio::test]
    async fn test_classroom_list_search_and_names() {
        let test_db = catalog_db().await;

        let page = list_classrooms(&test_db.pool, None, None, None).await.unwrap();
        let labels: Vec<&str> = page.items.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["10ème A", "11ème A", "1ère Année"]);
        assert_eq!(page.items[0].school_name.as_deref(), Some("Lycée Alpha"));
        assert_eq!(page.items[0].cycle_name.as_deref(), Some("Secondaire"));

        let by_cycle = list_classrooms(&test_db.pool, Some("SECONDAIRE"), None, None).await.unwrap();
        assert_eq!(by_cycle.total, 2);

        let by_school = list_classrooms(&test_db.pool, Some("beta"), None, None).await.unwrap();
        assert_eq!(by_school.total, 1);

        let filtered = list_classrooms(
            &test_db.pool,
            None,
            Some(test_db.school_id("École Beta")),
            None,
        )
        .await
        .unwrap();
        assert_eq!(filtered.items[0].label, "1ère Année");
    }

    #[tokio::test]
    async fn test_classroom_label_unique_per_school_and_trimmed() {
        let test_db = catalog_db().await;
        let alpha = test_db.school_id("Lycée Alpha");

        let input = ClassroomInput {
            school_id: alpha,
            cycle_id: None,
            label: "  10ème A ".to_string(),
            capacity: 40,
            main_teacher_id: None,
        };
        let result = create_classroom(&test_db.pool, &input).await;
        assert!(matches!(result, Err(AppError::Duplicate { field: "label", .. })));

        let id = create_classroom(
            &test_db.pool,
            &ClassroomInput {
                label: " 12ème A ".to_string(),
                ..input.clone()
            },
        )
        .await
        .unwrap();

        let rename = update_classroom(
            &test_db.pool,
            id,
            &ClassroomInput {
                label: "11ème A".to_string(),
                ..input
            },
        )
        .await;
        assert!(matches!(rename, Err(AppError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_deleting_school_cascades() {
        let test_db = catalog_db().await;
        let alpha = test_db.school_id("Lycée Alpha");

        create_grade(
            &test_db.pool,
            &GradeInput {
                school_id: alpha,
                name: "Seconde".to_string(),
                level: 10,
            },
        )
        .await
        .unwrap();

        delete_school(&test_db.pool, alpha).await.unwrap();

        assert_eq!(test_db.count("school_years").await, 0);
        assert_eq!(test_db.count("grades").await, 0);
        assert_eq!(test_db.count("classrooms").await, 1);
        assert_eq!(test_db.count("students").await, 1);
    }

    #[tokio::test]
    async fn test_grades_ordered_by_level_then_name() {
        let test_db = catalog_db().await;
        let alpha = test_db.school_id("Lycée Alpha");

        for (name, level) in [("Terminale", 12), ("Première", 11), ("Première bis", 11)] {
            create_grade(
                &test_db.pool,
                &GradeInput {
                    school_id: alpha,
                    name: name.to_string(),
                    level,
                },
            )
            .await
            .unwrap();
        }

        let names: Vec<String> = list_grades(&test_db.pool, Some(alpha))
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["Première", "Première bis", "Terminale"]);
    }

    #[tokio::test]
    async fn test_subject_coefficient_rounded_and_unique() {
        let test_db = catalog_db().await;
        let alpha = test_db.school_id("Lycée Alpha");

        let input = SubjectInput {
            school_id: alpha,
            name: "Mathématiques".to_string(),
            coefficient: 4.005,
        };
        let id = create_subject(&test_db.pool, &input).await.unwrap();

        let subject = get_subject(&test_db.pool, id).await.unwrap();
        assert!((subject.coefficient - 4.0).abs() < 0.011);

        let duplicate = create_subject(&test_db.pool, &input).await;
        assert!(matches!(duplicate, Err(AppError::Duplicate { field: "name", .. })));
    }
}
