pub mod test_db {
    use crate::auth::Role;
    use crate::db::{
        create_classroom, create_cycle, create_school, create_school_year, create_student,
        create_user,
    };
    use crate::error::AppError;
    use crate::models::{
        ClassroomInput, CycleInput, Gender, SchoolInput, SchoolYearInput, StudentInput,
    };
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        schools: Vec<String>,
        school_years: Vec<TestSchoolYear>,
        cycles: Vec<(String, i64)>,
        classrooms: Vec<TestClassroom>,
        students: Vec<TestStudent>,
    }

    pub struct TestUser {
        pub username: String,
        pub display_name: Option<String>,
        pub role: Role,
        pub password: String,
    }

    pub struct TestSchoolYear {
        pub school: String,
        pub label: String,
        pub start_date: NaiveDate,
        pub is_active: bool,
    }

    pub struct TestClassroom {
        pub school: String,
        pub label: String,
        pub cycle: Option<String>,
    }

    pub struct TestStudent {
        pub last_name: String,
        pub first_name: String,
        pub classroom: Option<String>,
    }

    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, username: &str, display_name: Option<&str>, role: Role) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                display_name: display_name.map(String::from),
                role,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn admin(self, username: &str, display_name: Option<&str>) -> Self {
            self.user(username, display_name, Role::Admin)
        }

        pub fn direction(self, username: &str, display_name: Option<&str>) -> Self {
            self.user(username, display_name, Role::Direction)
        }

        pub fn teacher(self, username: &str, display_name: Option<&str>) -> Self {
            self.user(username, display_name, Role::Enseignant)
        }

        pub fn school(mut self, name: &str) -> Self {
            self.schools.push(name.to_string());
            self
        }

        pub fn school_year(
            mut self,
            school: &str,
            label: &str,
            start_date: NaiveDate,
            is_active: bool,
        ) -> Self {
            self.school_years.push(TestSchoolYear {
                school: school.to_string(),
                label: label.to_string(),
                start_date,
                is_active,
            });
            self
        }

        pub fn cycle(mut self, name: &str, notation: i64) -> Self {
            self.cycles.push((name.to_string(), notation));
            self
        }

        pub fn classroom(mut self, school: &str, label: &str, cycle: Option<&str>) -> Self {
            self.classrooms.push(TestClassroom {
                school: school.to_string(),
                label: label.to_string(),
                cycle: cycle.map(String::from),
            });
            self
        }

        pub fn student(mut self, last_name: &str, first_name: &str, classroom: Option<&str>) -> Self {
            self.students.push(TestStudent {
                last_name: last_name.to_string(),
                first_name: first_name.to_string(),
                classroom: classroom.map(String::from),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
                    )
                    .with_test_writer()
                    .try_init();
            });

            // One connection, so every query sees the same in-memory database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut test_db = TestDb {
                pool,
                user_id_map: HashMap::new(),
                school_id_map: HashMap::new(),
                school_year_id_map: HashMap::new(),
                cycle_id_map: HashMap::new(),
                classroom_id_map: HashMap::new(),
                student_id_map: HashMap::new(),
            };

            for user in &self.users {
                let user_id = create_user(
                    &test_db.pool,
                    &user.username,
                    &user.password,
                    user.role,
                    user.display_name.as_deref(),
                    None,
                )
                .await?;
                test_db.user_id_map.insert(user.username.clone(), user_id);
            }

            for name in &self.schools {
                let input = SchoolInput {
                    name: name.clone(),
                    address: String::new(),
                    phone: String::new(),
                };
                let school_id = create_school(&test_db.pool, &input).await?;
                test_db.school_id_map.insert(name.clone(), school_id);
            }

            for year in &self.school_years {
                let input = SchoolYearInput {
                    school_id: test_db.school_id(&year.school),
                    label: year.label.clone(),
                    start_date: year.start_date,
                    end_date: year.start_date + chrono::Duration::days(300),
                    is_active: year.is_active,
                };
                let year_id = create_school_year(&test_db.pool, &input).await?;
                test_db.school_year_id_map.insert(year.label.clone(), year_id);
            }

            for (name, notation) in &self.cycles {
                let input = CycleInput {
                    name: name.clone(),
                    notation: *notation,
                };
                let cycle_id = create_cycle(&test_db.pool, &input).await?;
                test_db.cycle_id_map.insert(name.clone(), cycle_id);
            }

            for classroom in &self.classrooms {
                let input = ClassroomInput {
                    school_id: test_db.school_id(&classroom.school),
                    cycle_id: classroom.cycle.as_deref().map(|name| test_db.cycle_id(name)),
                    label: classroom.label.clone(),
                    capacity: 50,
                    main_teacher_id: None,
                };
                let classroom_id = create_classroom(&test_db.pool, &input).await?;
                test_db
                    .classroom_id_map
                    .insert(classroom.label.clone(), classroom_id);
            }

            for student in &self.students {
                let input = student_input(
                    &student.last_name,
                    &student.first_name,
                    student
                        .classroom
                        .as_deref()
                        .map(|label| test_db.classroom_id(label)),
                );
                let student_id = create_student(&test_db.pool, &input).await?;
                test_db
                    .student_id_map
                    .insert(student.last_name.clone(), student_id);
            }

            Ok(test_db)
        }
    }

    pub fn student_input(last_name: &str, first_name: &str, classroom_id: Option<i64>) -> StudentInput {
        StudentInput {
            last_name: last_name.to_string(),
            first_name: first_name.to_string(),
            birth_date: date(2012, 3, 14),
            city: "Bamako".to_string(),
            district: "Hamdallaye".to_string(),
            gender: Gender::Female,
            photo: None,
            matricule: None,
            classroom_id,
            enrollment_date: None,
            parent_name: None,
            parent_phone: None,
            notes: None,
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub school_id_map: HashMap<String, i64>,
        pub school_year_id_map: HashMap<String, i64>,
        pub cycle_id_map: HashMap<String, i64>,
        pub classroom_id_map: HashMap<String, i64>,
        pub student_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub fn school_id(&self, name: &str) -> i64 {
            self.school_id_map[name]
        }

        pub fn school_year_id(&self, label: &str) -> i64 {
            self.school_year_id_map[label]
        }

        pub fn cycle_id(&self, name: &str) -> i64 {
            self.cycle_id_map[name]
        }

        pub fn classroom_id(&self, label: &str) -> i64 {
            self.classroom_id_map[label]
        }

        pub fn student_id(&self, last_name: &str) -> i64 {
            self.student_id_map[last_name]
        }

        pub async fn count(&self, table: &str) -> i64 {
            let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await
                .expect("count query");
            count
        }
    }
}

pub mod test_utils {
    pub use super::test_db::{STANDARD_PASSWORD, TestDb, TestDbBuilder, date, student_input};

    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;

    use crate::init_rocket;

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone()).await;
        let client = Client::untracked(rocket)
            .await
            .expect("valid rocket instance");
        (client, test_db)
    }

    pub async fn login_test_user(
        client: &Client,
        username: &str,
        password: &str,
    ) -> Vec<Cookie<'static>> {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "username": username, "password": password }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);

        let cookies: Vec<Cookie<'static>> = response.cookies().iter().cloned().collect();
        assert!(
            cookies.iter().any(|cookie| cookie.name() == "session_token"),
            "login for {} did not set a session cookie",
            username
        );
        cookies
    }

    /// Two schools, one cycle per level used by the tests, a few classrooms
    /// and students, and one account per role that matters.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .admin("admin_user", Some("Admin User"))
            .direction("direction_user", Some("Direction User"))
            .teacher("teacher_user", Some("Teacher User"))
            .user("accountant_user", Some("Accountant User"), crate::auth::Role::Comptable)
            .school("Lycée Alpha")
            .school("École Beta")
            .school_year("Lycée Alpha", "2023-2024", date(2023, 10, 1), false)
            .school_year("Lycée Alpha", "2024-2025", date(2024, 10, 1), true)
            .school_year("École Beta", "2024-2025 B", date(2024, 10, 1), true)
            .cycle("Secondaire (Lycée, Technique, Professionnel)", 20)
            .cycle("Fondamental (1er Cycle)", 10)
            .classroom(
                "Lycée Alpha",
                "10ème A",
                Some("Secondaire (Lycée, Technique, Professionnel)"),
            )
            .classroom("École Beta", "1ère Année B", Some("Fondamental (1er Cycle)"))
            .student("Traoré", "Awa", Some("10ème A"))
            .student("Diallo", "Moussa", Some("1ère Année B"))
            .student("Keita", "Fanta", None)
            .build()
            .await
            .expect("Failed to build standard test database")
    }
}
