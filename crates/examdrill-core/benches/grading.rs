use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examdrill_core::grading::grade;
use examdrill_core::model::{Answer, AnswerKey, AnswerRecord, PracticeMode, Question, QuestionKind};
use examdrill_core::normalize::normalize;

fn paper(n: u32) -> (Vec<Question>, AnswerKey, AnswerRecord) {
    let letters = ["A", "B", "C", "D"];
    let mut questions = Vec::new();
    let mut key = AnswerKey::new();
    let mut answers = AnswerRecord::new();

    for i in 1..=n {
        let mut q = Question::placeholder(i);
        match i % 3 {
            0 => {
                q.kind = QuestionKind::MultiChoice;
                key.insert(i, Answer::multi(["A", "C"]));
                answers.insert(i, Answer::multi(["c", "a"]));
            }
            1 => {
                q.kind = QuestionKind::Num;
                q.options.clear();
                key.insert(i, Answer::single(format!("{i}")));
                if i % 2 == 0 {
                    answers.insert(i, Answer::single(format!("{i}")));
                }
            }
            _ => {
                key.insert(i, Answer::single(letters[(i % 4) as usize]));
                answers.insert(i, Answer::single(((i % 4) + 1).to_string()));
            }
        }
        questions.push(q);
    }
    (questions, key, answers)
}

fn bench_grade(c: &mut Criterion) {
    let mut group = c.benchmark_group("grade");

    for n in [25u32, 75, 300] {
        let (questions, key, answers) = paper(n);
        group.bench_function(format!("{n}_questions_mock"), |b| {
            b.iter(|| {
                grade(
                    black_box(&questions),
                    black_box(&answers),
                    black_box(&key),
                    PracticeMode::Mock,
                )
            })
        });
    }

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    let scalar = Answer::single("  b ");
    let digit = Answer::single("3");
    let set = Answer::multi(["d", "1", "C", "", "a", "D"]);

    group.bench_function("scalar", |b| b.iter(|| normalize(Some(black_box(&scalar)))));
    group.bench_function("digit_code", |b| b.iter(|| normalize(Some(black_box(&digit)))));
    group.bench_function("option_set", |b| b.iter(|| normalize(Some(black_box(&set)))));

    group.finish();
}

criterion_group!(benches, bench_grade, bench_normalize);
criterion_main!(benches);
